//! Expansion of a [`DatasetSource`] into the concrete Parquet objects to scan.
//!
//! - `Path` is a single object when one exists at that location; otherwise it is treated
//!   as a directory and every `.parquet` object below it is discovered
//! - `Paths` is taken as given, in order
//! - `Glob` lists the literal prefix before the first wildcard and keeps matching objects
//!
//! Discovery skips objects where any path segment below the root starts with `_` or `.`
//! (`_SUCCESS`, `_index.parquet`, `.crc` sidecars) and returns locations sorted, so repeated
//! runs scan in the same order.

use std::sync::Arc;
use futures::TryStreamExt;
use glob::{MatchOptions, Pattern};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore};
use crate::utils::file_interaction_local_and_cloud::{get_object_store, StoreAccess};
use crate::DatasetSource;

/// One Parquet object together with the store that serves it.
#[derive(Debug, Clone)]
pub struct DatasetFile {
    pub store: Arc<dyn ObjectStore>,
    pub meta: ObjectMeta,
}

/// Resolves `source` into the files to read, in scan order.
///
/// An empty `Paths` list resolves to no files.
///
/// # Errors
///
/// Returns an error if a listed file does not exist, a directory or glob matches no
/// files, the glob pattern is malformed, or the store cannot be reached.
pub async fn resolve_files(
    source: &DatasetSource,
    access: &StoreAccess,
) -> Result<Vec<DatasetFile>, Box<dyn std::error::Error + Send + Sync>> {
    match source {
        DatasetSource::Path(location) => resolve_path(location, access).await,
        DatasetSource::Paths(locations) => {
            let mut files = Vec::with_capacity(locations.len());
            for location in locations {
                let (store, path) = get_object_store(location, access).await?;
                let meta = store.head(&path).await?;
                files.push(DatasetFile { store, meta });
            }
            Ok(files)
        }
        DatasetSource::Glob(pattern) => expand_glob(pattern, access).await,
    }
}

async fn resolve_path(
    location: &str,
    access: &StoreAccess,
) -> Result<Vec<DatasetFile>, Box<dyn std::error::Error + Send + Sync>> {
    let (store, path) = get_object_store(location, access).await?;

    match store.head(&path).await {
        Ok(meta) => return Ok(vec![DatasetFile { store, meta }]),
        Err(object_store::Error::NotFound { .. }) => {}
        Err(e) => return Err(e.into()),
    }

    let files = discover(&store, &path, |meta| meta.location.extension() == Some("parquet")).await?;
    if files.is_empty() {
        return Err(format!("no files matched '{}'", location).into());
    }
    Ok(files)
}

async fn expand_glob(
    pattern: &str,
    access: &StoreAccess,
) -> Result<Vec<DatasetFile>, Box<dyn std::error::Error + Send + Sync>> {
    let Some(wildcard) = pattern.find(['*', '?', '[']) else {
        // Nothing to expand
        let (store, path) = get_object_store(pattern, access).await?;
        let meta = store.head(&path).await?;
        return Ok(vec![DatasetFile { store, meta }]);
    };

    let base = match pattern[..wildcard].rfind('/') {
        Some(slash) => &pattern[..slash],
        None => "",
    };
    let remainder = pattern[base.len()..].trim_start_matches('/');

    let (store, prefix) = get_object_store(base, access).await?;
    let full_pattern = if prefix.as_ref().is_empty() {
        remainder.to_string()
    } else {
        format!("{}/{}", prefix.as_ref(), remainder)
    };
    let matcher = Pattern::new(&full_pattern)?;
    let options = MatchOptions {
        require_literal_separator: true,
        ..MatchOptions::new()
    };

    let files = discover(&store, &prefix, |meta| {
        matcher.matches_with(meta.location.as_ref(), options)
    }).await?;

    if files.is_empty() {
        return Err(format!("no files matched '{}'", pattern).into());
    }
    Ok(files)
}

/// Lists every object under `prefix` that passes `keep` and is not hidden.
async fn discover<F>(
    store: &Arc<dyn ObjectStore>,
    prefix: &ObjectPath,
    keep: F,
) -> Result<Vec<DatasetFile>, Box<dyn std::error::Error + Send + Sync>>
where
    F: Fn(&ObjectMeta) -> bool,
{
    let listing: Vec<ObjectMeta> = store.list(Some(prefix)).try_collect().await?;

    let mut metas: Vec<ObjectMeta> = listing
        .into_iter()
        .filter(|meta| !is_hidden(&meta.location, prefix))
        .filter(|meta| keep(meta))
        .collect();
    metas.sort_by(|a, b| a.location.cmp(&b.location));

    Ok(metas
        .into_iter()
        .map(|meta| DatasetFile { store: Arc::clone(store), meta })
        .collect())
}

fn is_hidden(location: &ObjectPath, prefix: &ObjectPath) -> bool {
    match location.prefix_match(prefix) {
        Some(mut parts) => parts.any(|part| {
            let part = part.as_ref();
            part.starts_with('_') || part.starts_with('.')
        }),
        None => false,
    }
}
