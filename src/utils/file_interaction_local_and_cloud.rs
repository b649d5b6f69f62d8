use std::sync::Arc;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use object_store::{ObjectStore, aws::AmazonS3Builder, local::LocalFileSystem, path::Path as ObjectPath};
use url::Url;

/// How a filesystem binding authenticates against S3.
///
/// The public buildings dataset is read with unsigned requests, the spatial index with
/// whatever credentials the ambient AWS environment provides. Local paths ignore both
/// fields.
#[derive(Hash, Eq, PartialEq, Clone, Debug, Default)]
pub struct StoreAccess {
    pub anonymous: bool,
    pub region: Option<String>,
}

impl StoreAccess {
    /// Unsigned requests, for public buckets.
    pub fn anonymous(region: Option<String>) -> Self {
        Self { anonymous: true, region }
    }

    /// Signed requests using the AWS credential chain.
    pub fn credentialed(region: Option<String>) -> Self {
        Self { anonymous: false, region }
    }
}

/// Cache key for S3 stores that distinguishes between authenticated and anonymous access
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
struct S3CacheKey {
    bucket: String,
    access: StoreAccess,
}

/// Global cache for S3 stores, keyed by bucket and access mode.
///
/// Repeated benchmark runs resolve the same buckets over and over; caching keeps the
/// credential lookup out of every run after the first.
static S3_STORE_CACHE: Lazy<DashMap<S3CacheKey, Arc<dyn ObjectStore>>> =
    Lazy::new(DashMap::new);

/// Gets or creates a cached S3 store for the given bucket.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// # use bbox_bench::utils::file_interaction_local_and_cloud::{get_cached_s3_store, StoreAccess};
///
/// let access = StoreAccess::anonymous(Some("us-west-2".to_string()));
/// let store1 = get_cached_s3_store("overturemaps-us-west-2", &access).unwrap();
/// let store2 = get_cached_s3_store("overturemaps-us-west-2", &access).unwrap();
/// assert!(Arc::ptr_eq(&store1, &store2));
///
/// // Different access mode = different store
/// let signed = StoreAccess::credentialed(Some("us-west-2".to_string()));
/// let store3 = get_cached_s3_store("overturemaps-us-west-2", &signed).unwrap();
/// assert!(!Arc::ptr_eq(&store1, &store3));
/// ```
pub fn get_cached_s3_store(
    bucket: &str,
    access: &StoreAccess,
) -> Result<Arc<dyn ObjectStore>, Box<dyn std::error::Error + Send + Sync>> {
    let cache_key = S3CacheKey {
        bucket: bucket.to_string(),
        access: access.clone(),
    };
    let entry = S3_STORE_CACHE.entry(cache_key);
    let store = entry.or_try_insert_with(|| {
        create_s3_store(bucket, access)
    })?;
    Ok(Arc::clone(store.value()))
}

/// Creates an `ObjectStore` and path from a location string.
///
/// # Supported Location Formats
///
/// * **S3**: `"s3://bucket/key"` → AWS S3 store for `bucket` (cached), path `key`
/// * **Local**: absolute or relative paths → local filesystem rooted at `/`
///
/// # Errors
///
/// Returns an error if:
/// * The S3 URL is malformed or has no bucket
/// * The store cannot be built (e.g. invalid region)
/// * The current directory cannot be determined (for relative paths)
///
/// # Examples
///
/// ```no_run
/// # use bbox_bench::utils::file_interaction_local_and_cloud::{get_object_store, StoreAccess};
/// # tokio_test::block_on(async {
/// let access = StoreAccess::anonymous(Some("us-west-2".to_string()));
///
/// let (store, path) = get_object_store(
///     "s3://overturemaps-us-west-2/release/2024-08-20.0/theme=buildings/type=building",
///     &access,
/// ).await.unwrap();
/// let listing = store.list_with_delimiter(Some(&path)).await.unwrap();
///
/// let (store, path) = get_object_store("./fixtures/buildings.parquet", &access).await.unwrap();
/// let meta = store.head(&path).await.unwrap();
/// # });
/// ```
pub async fn get_object_store(
    location: &str,
    access: &StoreAccess,
) -> Result<(Arc<dyn ObjectStore>, ObjectPath), Box<dyn std::error::Error + Send + Sync>> {
    if location.starts_with("s3://") {
        let url = Url::parse(location)?;
        let bucket = url.host_str()
            .ok_or("Invalid S3 URL - no bucket specified")?;
        let key = url.path().trim_start_matches('/');

        let store = get_cached_s3_store(bucket, access)?;
        let path = ObjectPath::from(key);

        Ok((store, path))
    } else {
        use std::path::Path as StdPath;

        let std_path = StdPath::new(location);
        let absolute_path = if std_path.is_absolute() {
            std_path.to_path_buf()
        } else {
            std::env::current_dir()?.join(std_path)
        };

        #[cfg(windows)]
        let (root, relative) = {
            let path_str = absolute_path.to_string_lossy();
            if let Some(pos) = path_str.find(":\\") {
                let root = format!("{}:\\", &path_str[..pos]);
                let relative = path_str[pos+2..].trim_start_matches('\\').replace('\\', "/");
                (root, relative)
            } else {
                return Err("Invalid Windows path".into());
            }
        };

        #[cfg(not(windows))]
        let (root, relative) = {
            let path_str = absolute_path.to_string_lossy();
            let relative = path_str.trim_start_matches('/').trim_end_matches('/');
            ("/".to_string(), relative.to_string())
        };

        let local_store = LocalFileSystem::new_with_prefix(root)?;
        let store: Arc<dyn ObjectStore> = Arc::new(local_store);
        let path = ObjectPath::from(relative);

        Ok((store, path))
    }
}

/// Creates an S3 `ObjectStore` for a specific bucket.
///
/// Credentials, when `access.anonymous` is false, are resolved through `from_env()`:
/// environment variables, the shared credentials file, and instance/task/pod roles. This
/// crate never reads them itself.
pub fn create_s3_store(
    bucket: &str,
    access: &StoreAccess,
) -> Result<Arc<dyn ObjectStore>, Box<dyn std::error::Error + Send + Sync>> {
    let mut builder = AmazonS3Builder::from_env()
        .with_bucket_name(bucket);

    if let Some(region) = &access.region {
        builder = builder.with_region(region);
    }

    if access.anonymous {
        // Skip credential loading and request signing for public buckets
        builder = builder.with_skip_signature(true);
    }

    let s3_store = builder.build()?;
    Ok(Arc::new(s3_store))
}
