// ABOUTME: System containers: OSTree checkouts run by an OCI runtime under systemd.
// ABOUTME: Checkout lookup, run configuration, remote locations and exec.

mod checkout;
mod exec;
mod location;
mod oci_config;

pub use checkout::{Checkout, CheckoutInfo, CheckoutStore, read_info};
pub use exec::{ContainerState, ExecEnv, ExecRequest, exec_container, probe_state, service_active};
pub use location::resolve_remote_location;
pub use oci_config::RunConfig;
