//! Registered services and their trusted key material.
//!
//! The registry is built once at startup and never mutated afterwards, so it
//! is shared across request handlers behind an [`Arc`] without any locking.

use std::{collections::HashMap, sync::Arc};

use crate::{
    config::ServiceDefinition,
    error::{AuthError, ConfigError},
    keys::PublicKey,
    path::normalize_path,
};

/// A registered caller identity.
///
/// `paths` are normalized to start and end with `/`. `keys` are kept in
/// configuration order, which is the order signature verification tries
/// them in.
#[derive(Debug, Clone)]
pub struct Service {
    id: String,
    paths: Vec<String>,
    keys: Vec<PublicKey>,
}

impl Service {
    /// Creates a service, normalizing each path and dropping duplicates.
    ///
    /// No validation happens here; [`ServiceRegistry::load`] rejects
    /// definitions that would produce an unusable service.
    pub fn new<'a>(
        id: impl Into<String>,
        paths: impl IntoIterator<Item = &'a str>,
        keys: Vec<PublicKey>,
    ) -> Self {
        let mut normalized: Vec<String> = Vec::new();
        for path in paths {
            let path = normalize_path(path);
            if !normalized.contains(&path) {
                normalized.push(path);
            }
        }
        Self { id: id.into(), paths: normalized, keys }
    }

    /// The service identifier, matched against a token's `sub` claim.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Normalized allowed path prefixes.
    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Trusted public keys, in configuration order.
    #[must_use]
    pub fn keys(&self) -> &[PublicKey] {
        &self.keys
    }
}

/// Immutable mapping from service id to [`Service`].
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<Service>>,
}

impl ServiceRegistry {
    /// Validates `definitions` and builds the registry.
    ///
    /// Definitions are checked in order and the first problem found is
    /// returned, so a configuration with several errors reports them one at
    /// a time.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NoServices`] if `definitions` is empty
    /// - [`ConfigError::EmptyServiceId`] for a blank id
    /// - [`ConfigError::InvalidServiceId`] if the id has characters other than
    ///   visible ASCII
    /// - [`ConfigError::NoPaths`] / [`ConfigError::NoPublicKeys`] for empty lists
    /// - [`ConfigError::DuplicateService`] if an id repeats
    /// - [`ConfigError::InvalidPath`] for an empty path or one carrying a query string
    /// - [`ConfigError::InvalidPublicKey`] if a PEM parses as neither RSA nor EC
    pub fn load(definitions: &[ServiceDefinition]) -> Result<Self, ConfigError> {
        if definitions.is_empty() {
            return Err(ConfigError::NoServices);
        }

        let mut services = HashMap::with_capacity(definitions.len());
        for definition in definitions {
            let service = build_service(definition)?;
            if services.contains_key(service.id()) {
                return Err(ConfigError::duplicate_service(service.id()));
            }
            tracing::debug!(
                service = service.id(),
                paths = ?service.paths(),
                keys = service.keys().len(),
                "registered service"
            );
            services.insert(service.id.clone(), Arc::new(service));
        }

        Ok(Self { services })
    }

    /// Looks up a service by id.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ServiceNotFound`] if no service has this id.
    pub fn get_service(&self, id: &str) -> Result<Arc<Service>, AuthError> {
        self.services.get(id).cloned().ok_or_else(|| AuthError::service_not_found(id))
    }

    /// Number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether the registry holds no services. Never true for a loaded registry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Registered service ids, sorted.
    #[must_use]
    pub fn service_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.services.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

fn build_service(definition: &ServiceDefinition) -> Result<Service, ConfigError> {
    let id = definition.id.as_str();
    if id.trim().is_empty() {
        return Err(ConfigError::EmptyServiceId);
    }
    // The id is echoed back in a response header.
    if !id.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(ConfigError::InvalidServiceId { id: id.to_owned() });
    }
    if definition.paths.is_empty() {
        return Err(ConfigError::no_paths(id));
    }
    if definition.public_keys.is_empty() {
        return Err(ConfigError::no_public_keys(id));
    }

    for path in &definition.paths {
        if path.trim().is_empty() || path.contains('?') {
            return Err(ConfigError::invalid_path(id, path.as_str()));
        }
    }

    let keys = definition
        .public_keys
        .iter()
        .enumerate()
        .map(|(index, pem)| {
            PublicKey::from_pem(pem.trim().as_bytes()).map_err(|source| {
                ConfigError::InvalidPublicKey { service: id.to_owned(), index, source }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Service::new(id, definition.paths.iter().map(|p| p.trim()), keys))
}
