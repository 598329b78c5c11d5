// ABOUTME: Local image deletion with usage checks and confirmation.
// ABOUTME: Resolves targets across backends, plans exclusions, then deletes per backend.

use super::remote::delete_remote;
use crate::backend::{BackendKind, BackendRegistry, ContainerRecord, ImageRecord};
use crate::error::{Error, Result};
use crate::output::Output;
use crate::process::CommandRunner;
use crate::prompt::{Prompt, is_affirmative};
use crate::types::{ContainerId, ImageId};
use nonempty::NonEmpty;
use std::collections::HashSet;

/// Arguments of `images delete`.
#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    pub targets: Vec<String>,
    pub all: bool,
    /// Backend name given with `--storage`.
    pub storage: Option<String>,
    pub force: bool,
    pub assume_yes: bool,
    pub remote: bool,
}

/// Which images a delete covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Targets(NonEmpty<String>),
}

impl DeleteOptions {
    /// Exactly one of a target list and `--all` must be given.
    pub fn selection(&self) -> Result<Selection> {
        match (NonEmpty::from_slice(&self.targets), self.all) {
            (Some(targets), false) => Ok(Selection::Targets(targets)),
            (None, true) => Ok(Selection::All),
            _ => Err(Error::InvalidArguments(
                "you must select --all or provide a list of images to delete".to_string(),
            )),
        }
    }

    fn storage_kind(&self) -> Result<Option<BackendKind>> {
        self.storage.as_deref().map(str::parse).transpose()
    }

    fn describe_targets(&self) -> String {
        if self.targets.is_empty() {
            "all images".to_string()
        } else {
            self.targets.join(", ")
        }
    }
}

/// The outcome of classifying a working set, before anything is deleted.
#[derive(Debug, Clone)]
pub struct DeletePlan {
    /// Every resolved image, in resolution order, with `used` filled in.
    pub images: Vec<ImageRecord>,
    /// Width of the IMAGE column.
    pub width: usize,
    /// Images that will be handed to their backend.
    pub deletions: Vec<ImageRecord>,
    /// Used images kept because `force` was not given.
    pub conflicts: Vec<ImageRecord>,
    /// Untagged layers of tagged images, never deleted.
    pub unnamed_layers: Vec<ImageRecord>,
}

impl DeletePlan {
    /// Classify `images` against the containers of every backend.
    ///
    /// Exclusions are keyed by image ID, so two records for the same image are
    /// treated alike.
    pub fn new(mut images: Vec<ImageRecord>, containers: &[ContainerRecord], force: bool) -> Self {
        let in_use: HashSet<&ImageId> = containers.iter().map(|c| &c.image).collect();
        for image in &mut images {
            image.used = in_use.contains(&image.id);
        }

        let width = images
            .iter()
            .map(|img| img.display_name().chars().count())
            .max()
            .unwrap_or(0)
            + 2;

        let unnamed_layers: Vec<ImageRecord> = images
            .iter()
            .filter(|img| img.is_unnamed_layer())
            .cloned()
            .collect();
        let conflicts: Vec<ImageRecord> = if force {
            Vec::new()
        } else {
            images
                .iter()
                .filter(|img| img.used && !img.is_unnamed_layer())
                .cloned()
                .collect()
        };

        let excluded: HashSet<&ImageId> = unnamed_layers
            .iter()
            .chain(conflicts.iter())
            .map(|img| &img.id)
            .collect();
        let deletions = images
            .iter()
            .filter(|img| !excluded.contains(&img.id))
            .cloned()
            .collect();

        Self {
            images,
            width,
            deletions,
            conflicts,
            unnamed_layers,
        }
    }

    /// The confirmation table, one row per resolved image.
    pub fn table(&self, assume_yes: bool) -> Vec<String> {
        let header = if assume_yes {
            "The following images will be deleted.\n"
        } else {
            "Do you wish to delete the following images?\n"
        };
        let mut lines = vec![header.to_string(), self.row("IMAGE", "STORAGE", "USED")];
        for image in &self.images {
            lines.push(self.row(
                image.display_name(),
                image.backend.as_str(),
                if image.used { "YES" } else { "NO" },
            ));
        }
        lines
    }

    fn row(&self, image: &str, storage: &str, used: &str) -> String {
        format!("   {:<width$} {:<12}  {}", image, storage, used, width = self.width)
    }
}

/// Report for a used image that was kept.
pub fn conflict_message(image: &ImageRecord, containers: &[ContainerId]) -> String {
    let ids = containers
        .iter()
        .map(|id| id.short())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Error: conflict: unable to remove repository reference \"{}\"(must-force) - container(s) {} is using its referenced image {}",
        image.input_name,
        ids,
        image.id.short()
    )
}

/// Notice for an untagged layer that was kept.
pub fn unnamed_layer_message(image: &ImageRecord) -> String {
    format!("Image {} is an unnamed layer of an image", image.id.short())
}

/// Run `images delete`.
///
/// Returns the process exit status: remote deletion reports partial failure
/// through it, local deletion returns 0 or an error.
pub async fn delete_images(
    registry: &BackendRegistry,
    runner: &dyn CommandRunner,
    prompt: &dyn Prompt,
    output: &Output,
    opts: &DeleteOptions,
) -> Result<i32> {
    let selection = opts.selection()?;

    if opts.remote {
        return match selection {
            Selection::Targets(targets) => {
                Ok(delete_remote(runner, output, &Vec::from(targets)).await)
            }
            Selection::All => Err(Error::InvalidArguments(
                "--remote requires a list of images".to_string(),
            )),
        };
    }

    let storage = opts.storage_kind()?;
    let images = match selection {
        Selection::All => registry.list_images(storage, true).await?,
        Selection::Targets(targets) => resolve_targets(registry, &targets, storage).await?,
    };
    if images.is_empty() {
        return Err(Error::NoImagesToDelete);
    }

    let containers = registry.list_containers().await?;
    let plan = DeletePlan::new(images, &containers, opts.force);
    for line in plan.table(opts.assume_yes) {
        output.info(&line);
    }

    if !opts.assume_yes {
        let answer = prompt.ask(output, "\nConfirm (y/N) ")?;
        if !is_affirmative(&answer) {
            return Err(Error::Aborted(opts.describe_targets()));
        }
    }

    let mut failure = None;
    for image in &plan.deletions {
        let backend = registry
            .get(image.backend)
            .ok_or_else(|| Error::UnknownBackend(image.backend.to_string()))?;
        tracing::debug!(image = %image.input_name, backend = %image.backend, "deleting");
        if let Err(e) = backend.delete_image(&image.input_name, opts.force).await {
            output.failure(&format!("Failed to delete {}: {}", image.input_name, e));
            failure.get_or_insert(e);
        }
    }

    for image in &plan.conflicts {
        let blocking = registry.container_ids_for_image(&image.id).await?;
        output.info(&conflict_message(image, &blocking));
    }
    for image in &plan.unnamed_layers {
        output.info(&unnamed_layer_message(image));
    }

    match failure {
        Some(e) => Err(e.into()),
        None => Ok(0),
    }
}

/// Resolve each target, failing on the first one that cannot be found.
/// Targets naming the same image in the same backend collapse to one record.
async fn resolve_targets(
    registry: &BackendRegistry,
    targets: &NonEmpty<String>,
    storage: Option<BackendKind>,
) -> Result<Vec<ImageRecord>> {
    let preferred = storage.or(Some(registry.default_kind()));
    let mut seen = HashSet::new();
    let mut images = Vec::new();
    for target in targets {
        let image = registry
            .resolve_image(target, preferred, storage.is_some())
            .await?;
        if seen.insert((image.backend, image.id.clone())) {
            images.push(image);
        }
    }
    Ok(images)
}
