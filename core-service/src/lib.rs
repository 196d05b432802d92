//! Reason service registration.
//!
//! The composition root for reason persistence: given a connection string, a
//! [`RepositoryMode`] and a [`ContextLifetime`], it builds exactly one
//! repository and hands it out as `Arc<dyn ReasonRepository>`. Callers never
//! see which backend they got.
//!
//! ```rust,ignore
//! use core_runtime::{ContextLifetime, RepositoryMode};
//!
//! let services = core_service::add_reason_services(
//!     "sqlite:/var/lib/app/reasons.db",
//!     RepositoryMode::TrackedContext,
//!     ContextLifetime::Scoped,
//! )?;
//! services.ensure_schema().await?;
//!
//! let reasons = services.repository();
//! let page = reasons.get_articles(&PageRequest::new(0, 20), None).await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use core_reasons::{
    CommandReasonRepository, MappedReasonRepository, ReasonAppContextFactory, ReasonRepository,
    TrackedReasonRepository,
};
use core_runtime::config::{ContextLifetime, ReasonsConfig, RepositoryMode};
use core_runtime::logging::redact_connection_string;
use tracing::info;

/// The wired reason repository and what it was built from.
#[derive(Clone)]
pub struct ReasonServices {
    mode: RepositoryMode,
    connection_string: String,
    repository: Arc<dyn ReasonRepository>,
    context_factory: Option<ReasonAppContextFactory>,
}

/// Build the reason repository for `mode`.
///
/// Fails with [`CoreError::Configuration`] when `connection_string` is blank.
/// Only [`RepositoryMode::TrackedContext`] creates a context factory.
pub fn add_reason_services(
    connection_string: &str,
    mode: RepositoryMode,
    lifetime: ContextLifetime,
) -> Result<ReasonServices> {
    let factory = (mode == RepositoryMode::TrackedContext).then(|| {
        ReasonAppContextFactory::new()
            .with_connection_string(connection_string)
            .with_lifetime(lifetime)
    });
    wire(connection_string, mode, factory)
}

impl ReasonServices {
    /// Wire from validated settings.
    pub fn from_config(config: &ReasonsConfig) -> Result<Self> {
        config.validate()?;
        let connection_string = config.default_connection().unwrap_or_default();

        let factory = (config.repository_mode == RepositoryMode::TrackedContext).then(|| {
            ReasonAppContextFactory::new()
                .with_configuration(Arc::new(config.clone()))
                .with_lifetime(config.context_lifetime)
        });
        wire(connection_string, config.repository_mode, factory)
    }

    /// Shared handle to the repository.
    pub fn repository(&self) -> Arc<dyn ReasonRepository> {
        Arc::clone(&self.repository)
    }

    pub fn mode(&self) -> RepositoryMode {
        self.mode
    }

    /// The context factory behind the tracked-context backend.
    pub fn context_factory(&self) -> Option<&ReasonAppContextFactory> {
        self.context_factory.as_ref()
    }

    /// Services for a new scope. With a scoped context lifetime the new
    /// scope gets its own connection pool; everything else is shared.
    pub fn create_scope(&self) -> Self {
        let Some(factory) = &self.context_factory else {
            return self.clone();
        };

        let scope = factory.create_scope();
        Self {
            repository: Arc::new(TrackedReasonRepository::from_factory(scope.clone())),
            context_factory: Some(scope),
            ..self.clone()
        }
    }

    /// Create the `Reasons` table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        core_reasons::db::migrate(&self.connection_string).await?;
        Ok(())
    }

    /// Close pooled connections held for the tracked backend.
    pub async fn shutdown(&self) {
        if let Some(factory) = &self.context_factory {
            factory.close().await;
        }
    }
}

fn wire(
    connection_string: &str,
    mode: RepositoryMode,
    factory: Option<ReasonAppContextFactory>,
) -> Result<ReasonServices> {
    if connection_string.trim().is_empty() {
        return Err(CoreError::Configuration(
            "Connection string must not be null or empty.".to_string(),
        ));
    }

    let repository: Arc<dyn ReasonRepository> = match (&factory, mode) {
        (Some(factory), _) => Arc::new(TrackedReasonRepository::from_factory(factory.clone())),
        (None, RepositoryMode::MappedQuery) => {
            Arc::new(MappedReasonRepository::new(connection_string))
        }
        (None, RepositoryMode::DirectCommand) => {
            Arc::new(CommandReasonRepository::new(connection_string))
        }
        (None, RepositoryMode::TrackedContext) => Arc::new(TrackedReasonRepository::new(
            connection_string,
        )),
    };

    info!(
        mode = %mode,
        lifetime = ?factory.as_ref().map(|f| f.lifetime()),
        connection = %redact_connection_string(connection_string),
        "Registered reason services"
    );

    Ok(ReasonServices {
        mode,
        connection_string: connection_string.to_owned(),
        repository,
        context_factory: factory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_connection_string_is_rejected() {
        for mode in RepositoryMode::ALL {
            let err = add_reason_services("  ", mode, ContextLifetime::Transient)
                .err()
                .unwrap();
            assert!(err.is_configuration());
            assert_eq!(
                err.to_string(),
                "Configuration error: Connection string must not be null or empty."
            );
        }
    }

    #[test]
    fn test_each_mode_wires_its_backend() {
        for mode in RepositoryMode::ALL {
            let services =
                add_reason_services("sqlite:reasons.db", mode, ContextLifetime::Transient)
                    .unwrap();

            assert_eq!(services.mode(), mode);
            assert_eq!(services.repository().backend(), mode);
            assert_eq!(
                services.context_factory().is_some(),
                mode == RepositoryMode::TrackedContext
            );
        }
    }

    #[test]
    fn test_from_config_uses_configured_mode() {
        let config = ReasonsConfig::builder()
            .default_connection("sqlite:reasons.db")
            .repository_mode(RepositoryMode::MappedQuery)
            .build()
            .unwrap();

        let services = ReasonServices::from_config(&config).unwrap();

        assert_eq!(services.repository().backend(), RepositoryMode::MappedQuery);
        assert!(services.context_factory().is_none());
    }

    #[test]
    fn test_from_config_tracked_factory_reads_configuration() {
        let config = ReasonsConfig::builder()
            .default_connection("sqlite:configured.db")
            .context_lifetime(ContextLifetime::Singleton)
            .build()
            .unwrap();

        let services = ReasonServices::from_config(&config).unwrap();
        let factory = services.context_factory().unwrap();

        assert_eq!(factory.lifetime(), ContextLifetime::Singleton);
        assert_eq!(
            factory.resolve_connection_string().unwrap(),
            "sqlite:configured.db"
        );
    }

    #[test]
    fn test_scope_shares_stateless_backends() {
        let services = add_reason_services(
            "sqlite:reasons.db",
            RepositoryMode::DirectCommand,
            ContextLifetime::Scoped,
        )
        .unwrap();

        let scope = services.create_scope();

        assert!(Arc::ptr_eq(&services.repository(), &scope.repository()));
    }

    #[test]
    fn test_scope_replaces_tracked_repository() {
        let services = add_reason_services(
            "sqlite:reasons.db",
            RepositoryMode::TrackedContext,
            ContextLifetime::Scoped,
        )
        .unwrap();

        let scope = services.create_scope();

        assert!(!Arc::ptr_eq(&services.repository(), &scope.repository()));
        assert_eq!(
            scope.context_factory().map(|f| f.lifetime()),
            Some(ContextLifetime::Scoped)
        );
    }
}
