// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Image Resolver (§4.2): maps `(connector_type, version)` to a registry
//! image reference, with optional cloud-registry login for private ECR
//! hosts.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use worker_core::ExecutionError;

/// Matches `<account>.dkr.ecr.<region>.amazonaws.com[.cn]` or
/// `public.ecr.aws` hosts that require a login token before pulling.
#[allow(clippy::expect_used)]
static PRIVATE_REGISTRY_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+\.dkr\.ecr\.[a-z0-9-]+\.amazonaws\.com(\.cn)?|public\.ecr\.aws)$")
        .expect("constant regex pattern is valid")
});

/// A short-lived login token for a private registry host.
#[derive(Debug, Clone)]
pub struct RegistryToken {
    pub endpoint: String,
    pub username: String,
    pub password: String,
}

/// Acquires a short-lived token for a cloud container registry (e.g. ECR).
///
/// Out of scope for this crate's own implementation: the concrete client
/// (AWS STS/ECR SDK calls) is injected by the daemon binary. Adapters here
/// only know how to decode the token and perform the daemon login.
#[async_trait]
pub trait CloudRegistryAuth: Send + Sync {
    /// Fetch a base64-encoded `username:password` token for `registry_host`.
    async fn get_authorization_token(&self, registry_host: &str) -> Result<String, ExecutionError>;
}

/// `<prefix>-<connector_type>:<version>` resolver, with `version` defaulting
/// to `latest` when empty.
#[derive(Clone)]
pub struct ImageResolver {
    prefix: String,
}

impl ImageResolver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Resolve a connector type/version pair to a fully qualified image
    /// reference.
    pub fn resolve(&self, connector_type: &str, version: &str) -> String {
        let version = if version.is_empty() { "latest" } else { version };
        format!("{}-{}:{}", self.prefix, connector_type, version)
    }

    /// Extract the registry host from an image reference (the part before
    /// the first `/`, if any).
    pub fn registry_host(image: &str) -> Option<&str> {
        image.split_once('/').map(|(host, _rest)| host)
    }

    /// Whether `image` targets a private-registry host that needs a login
    /// before pulling (private ECR or public ECR).
    pub fn needs_cloud_login(image: &str) -> bool {
        Self::registry_host(image).is_some_and(|host| PRIVATE_REGISTRY_HOST.is_match(host))
    }

    /// Decode a base64 `username:password` authorization token.
    pub fn decode_token(token: &str) -> Result<(String, String), ExecutionError> {
        use base64::Engine;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(token)
            .map_err(|e| ExecutionError::Configuration(format!("invalid registry token: {e}")))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|e| ExecutionError::Configuration(format!("invalid registry token: {e}")))?;
        decoded.split_once(':').map(|(u, p)| (u.to_string(), p.to_string())).ok_or_else(|| {
            ExecutionError::Configuration("registry token missing ':' separator".to_string())
        })
    }

    /// If `image` targets a private-registry host, fetch and decode a login
    /// token for it via `auth`. Returns `None` for any image that doesn't
    /// need cloud login, so callers can skip the `docker login` step
    /// entirely for Docker Hub and other public-prefix images.
    pub async fn registry_token(
        image: &str,
        auth: &dyn CloudRegistryAuth,
    ) -> Result<Option<RegistryToken>, ExecutionError> {
        if !Self::needs_cloud_login(image) {
            return Ok(None);
        }
        let host = Self::registry_host(image)
            .ok_or_else(|| ExecutionError::Configuration(format!("no registry host in image reference {image}")))?;
        let token = auth.get_authorization_token(host).await?;
        let (username, password) = Self::decode_token(&token)?;
        Ok(Some(RegistryToken { endpoint: host.to_string(), username, password }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults_empty_version_to_latest() {
        let r = ImageResolver::new("registry.example.com/connectors");
        assert_eq!(
            r.resolve("postgres", ""),
            "registry.example.com/connectors-postgres:latest"
        );
    }

    #[test]
    fn resolve_uses_explicit_version() {
        let r = ImageResolver::new("registry.example.com/connectors");
        assert_eq!(
            r.resolve("postgres", "v0.3.0"),
            "registry.example.com/connectors-postgres:v0.3.0"
        );
    }

    #[yare::parameterized(
        private_ecr  = { "123456789012.dkr.ecr.us-east-1.amazonaws.com/connectors-postgres:latest", true },
        public_ecr   = { "public.ecr.aws/olake/connectors-postgres:latest",                          true },
        dockerhub    = { "olake/connectors-postgres:latest",                                         false },
        no_slash     = { "postgres:latest",                                                          false },
    )]
    fn needs_cloud_login_matches_only_ecr_hosts(image: &str, expected: bool) {
        assert_eq!(ImageResolver::needs_cloud_login(image), expected);
    }

    #[test]
    fn image_without_slash_has_no_registry_host() {
        assert_eq!(ImageResolver::registry_host("postgres:latest"), None);
    }

    #[test]
    fn decode_token_splits_username_and_password() {
        use base64::Engine;
        let token = base64::engine::general_purpose::STANDARD.encode("AWS:secret-pass");
        let (user, pass) = ImageResolver::decode_token(&token).unwrap();
        assert_eq!(user, "AWS");
        assert_eq!(pass, "secret-pass");
    }

    #[test]
    fn decode_token_rejects_malformed_base64() {
        assert!(ImageResolver::decode_token("not-base64!!!").is_err());
    }

    struct StubAuth;

    #[async_trait]
    impl CloudRegistryAuth for StubAuth {
        async fn get_authorization_token(&self, _registry_host: &str) -> Result<String, ExecutionError> {
            use base64::Engine;
            Ok(base64::engine::general_purpose::STANDARD.encode("AWS:token-pass"))
        }
    }

    #[tokio::test]
    async fn registry_token_is_none_for_images_that_do_not_need_login() {
        let result = ImageResolver::registry_token("olake/connectors-postgres:latest", &StubAuth).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn registry_token_fetches_and_decodes_for_private_ecr_images() {
        let result = ImageResolver::registry_token(
            "123456789012.dkr.ecr.us-east-1.amazonaws.com/connectors-postgres:latest",
            &StubAuth,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(result.endpoint, "123456789012.dkr.ecr.us-east-1.amazonaws.com");
        assert_eq!(result.username, "AWS");
        assert_eq!(result.password, "token-pass");
    }
}
