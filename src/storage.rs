use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use uuid::Uuid;

use crate::config::ObjectStoreConfig;

/// Object storage used for profile images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn put_image(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_image(&self, key: &str) -> anyhow::Result<()>;
    async fn presign_image(&self, key: &str, seconds: u64) -> anyhow::Result<String>;
}

/// S3 / MinIO backed [`ImageStore`].
#[derive(Clone)]
pub struct S3ImageStore {
    client: Client,
    bucket: String,
}

impl S3ImageStore {
    pub async fn new(cfg: &ObjectStoreConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        // MinIO only understands path-style addressing.
        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
        })
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn put_image(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("s3 put_object {key}"))?;
        Ok(())
    }

    async fn delete_image(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("s3 delete_object {key}"))?;
        Ok(())
    }

    async fn presign_image(&self, key: &str, seconds: u64) -> anyhow::Result<String> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(PresigningConfig::expires_in(
                std::time::Duration::from_secs(seconds),
            )?)
            .await
            .context("s3 presign_get")?;
        Ok(presigned.uri().to_string())
    }
}

/// Accepted profile image types and the extension stored with them.
pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

pub fn profile_image_key(user_id: Uuid, ext: &str) -> String {
    format!("profiles/{}/{}.{}", user_id, Uuid::new_v4(), ext)
}


#[cfg(test)]
mod tests {
    use super::fake::MemoryImageStore;
    use super::*;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn profile_image_key_is_scoped_by_user() {
        let user = Uuid::new_v4();
        let key = profile_image_key(user, "png");
        assert!(key.starts_with(&format!("profiles/{}/", user)));
        assert!(key.ends_with(".png"));
        assert_ne!(key, profile_image_key(user, "png"));
    }

    #[tokio::test]
    async fn memory_store_put_delete_presign() {
        let store = MemoryImageStore::default();
        store
            .put_image("profiles/a/b.jpg", Bytes::from_static(b"img"), "image/jpeg")
            .await
            .unwrap();
        assert!(store.objects.lock().unwrap().contains_key("profiles/a/b.jpg"));

        let url = store.presign_image("profiles/a/b.jpg", 600).await.unwrap();
        assert!(url.contains("profiles/a/b.jpg"));

        store.delete_image("profiles/a/b.jpg").await.unwrap();
        assert!(store.objects.lock().unwrap().is_empty());
    }
}
