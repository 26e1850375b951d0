use anyhow::Result;
use async_trait::async_trait;

use crate::task_manager::TaskManager;

/// Base trait for providers that can create components asynchronously.
///
/// Enables dependency injection pattern with async initialization support.
///
/// # Example
///
/// ```no_run
/// use bledomd::providers::traits::AsyncProvider;
///
/// struct ConfigProvider;
///
/// #[async_trait::async_trait]
/// impl AsyncProvider<String> for ConfigProvider {
///     async fn provide(&self) -> anyhow::Result<String> {
///         Ok("config data".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait AsyncProvider<T> {
    async fn provide(&self) -> Result<T>;
}

/// Trait for services that can be started through TaskManager.
///
/// Provides service lifecycle management with prioritization and
/// criticality classification for graceful degradation.
///
/// # Example
///
/// ```no_run
/// use bledomd::providers::traits::ServiceProvider;
/// use bledomd::task_manager::TaskManager;
/// use anyhow::Result;
///
/// struct ExampleService;
///
/// #[async_trait::async_trait]
/// impl ServiceProvider for ExampleService {
///     async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
///         task_manager.spawn_task("example".to_string(), |_token| async {
///             // Service implementation
///             Ok(())
///         }).await
///     }
///
///     fn name(&self) -> &'static str { "ExampleService" }
///     fn priority(&self) -> i32 { 5 }
///     fn is_critical(&self) -> bool { false }
/// }
/// ```
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    /// Starts the service in TaskManager.
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()>;

    /// Returns service name for logging and management.
    fn name(&self) -> &'static str;

    /// Returns startup priority (higher numbers start first).
    fn priority(&self) -> i32 {
        0
    }

    /// Indicates if service is critical for system operation.
    fn is_critical(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    struct MockValueProvider {
        value: u32,
        call_count: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl AsyncProvider<u32> for MockValueProvider {
        async fn provide(&self) -> Result<u32> {
            *self.call_count.lock().unwrap() += 1;
            Ok(self.value)
        }
    }

    struct MockFailingProvider;

    #[async_trait]
    impl AsyncProvider<u32> for MockFailingProvider {
        async fn provide(&self) -> Result<u32> {
            Err(anyhow!("provider failure"))
        }
    }

    struct MockService;

    #[async_trait]
    impl ServiceProvider for MockService {
        async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
            task_manager
                .spawn_task("mock".to_string(), |token| async move {
                    token.cancelled().await;
                    Ok(())
                })
                .await
        }

        fn name(&self) -> &'static str {
            "MockService"
        }
    }

    #[tokio::test]
    async fn async_provider_returns_value_per_call() {
        let provider = MockValueProvider {
            value: 42,
            call_count: Arc::new(Mutex::new(0)),
        };

        assert_eq!(provider.provide().await.unwrap(), 42);
        assert_eq!(provider.provide().await.unwrap(), 42);
        assert_eq!(*provider.call_count.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn async_provider_propagates_errors() {
        let result = MockFailingProvider.provide().await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("provider failure"));
    }

    #[tokio::test]
    async fn service_provider_defaults() {
        let service = MockService;
        assert_eq!(service.priority(), 0);
        assert!(!service.is_critical());

        let mut task_manager = TaskManager::new();
        service.start(&mut task_manager).await.unwrap();
        assert!(task_manager.is_running("mock"));
        task_manager.shutdown_all().await.unwrap();
    }
}
