//! Action and result filters.
//!
//! Filters are attached to controllers and actions as [`FilterMetadata`]
//! items. A single list holds both attribute-declared filters and the
//! synthetic bridges that let a controller act as its own filter; the
//! [`FilterPipeline`] executes that list without knowing which is which.
//!
//! Execution order:
//!
//! 1. `on_action_executing` for each action filter, lowest order first
//! 2. the action, unless a filter short-circuited by setting a result
//! 3. `on_action_executed` in reverse, for the filters whose executing
//!    hook completed without short-circuiting
//! 4. the same executing/executed pair for result filters

use async_trait::async_trait;
use girder_core::{HttpRequest, HttpResponse, Result};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::trace;

/// Order used by the controller bridge filters so they run first.
pub const CONTROLLER_FILTER_ORDER: i32 = i32::MIN;

/// An item in a controller or action filter list.
pub trait FilterMetadata: Send + Sync + fmt::Debug {
    /// Lower runs earlier. Ties keep registration order.
    fn order(&self) -> i32 {
        0
    }

    fn as_action_filter(&self) -> Option<&dyn ActionFilter> {
        None
    }

    fn as_result_filter(&self) -> Option<&dyn ResultFilter> {
        None
    }
}

#[async_trait]
pub trait ActionFilter: Send + Sync {
    /// Runs before the action. Setting `context.result` short-circuits.
    async fn on_action_executing(&self, context: &mut ActionExecutingContext) -> Result<()>;

    async fn on_action_executed(&self, _context: &mut ActionExecutedContext) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait ResultFilter: Send + Sync {
    /// Runs before the result is returned. Setting `context.cancel` skips
    /// the remaining result filters.
    async fn on_result_executing(&self, context: &mut ResultExecutingContext) -> Result<()>;

    async fn on_result_executed(&self, _context: &mut ResultExecutedContext) -> Result<()> {
        Ok(())
    }
}

/// A live controller instance handling one request.
///
/// Controllers whose type declares the action-filter or result-filter
/// capability expose their own hooks here; the bridge filters forward to
/// them.
pub trait ControllerInstance: Send + Sync {
    fn as_action_filter(&self) -> Option<&dyn ActionFilter> {
        None
    }

    fn as_result_filter(&self) -> Option<&dyn ResultFilter> {
        None
    }
}

pub struct ActionExecutingContext {
    pub request: Arc<HttpRequest>,
    pub controller: Arc<dyn ControllerInstance>,
    pub action_name: String,
    /// Set by a filter to skip the action.
    pub result: Option<HttpResponse>,
}

impl ActionExecutingContext {
    pub fn new(
        request: Arc<HttpRequest>,
        controller: Arc<dyn ControllerInstance>,
        action_name: impl Into<String>,
    ) -> Self {
        Self {
            request,
            controller,
            action_name: action_name.into(),
            result: None,
        }
    }
}

impl fmt::Debug for ActionExecutingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionExecutingContext")
            .field("action_name", &self.action_name)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

pub struct ActionExecutedContext {
    pub request: Arc<HttpRequest>,
    pub controller: Arc<dyn ControllerInstance>,
    pub action_name: String,
    pub result: HttpResponse,
    /// Whether a filter short-circuited the action.
    pub canceled: bool,
}

pub struct ResultExecutingContext {
    pub request: Arc<HttpRequest>,
    pub controller: Arc<dyn ControllerInstance>,
    pub action_name: String,
    pub result: HttpResponse,
    pub cancel: bool,
}

pub struct ResultExecutedContext {
    pub request: Arc<HttpRequest>,
    pub controller: Arc<dyn ControllerInstance>,
    pub action_name: String,
    pub result: HttpResponse,
    pub canceled: bool,
}

// ============================================================================
// Controller bridges
// ============================================================================

/// Forwards action-filter hooks to the controller instance.
#[derive(Debug, Default, Clone, Copy)]
pub struct ControllerActionFilter;

impl FilterMetadata for ControllerActionFilter {
    fn order(&self) -> i32 {
        CONTROLLER_FILTER_ORDER
    }

    fn as_action_filter(&self) -> Option<&dyn ActionFilter> {
        Some(self)
    }
}

#[async_trait]
impl ActionFilter for ControllerActionFilter {
    async fn on_action_executing(&self, context: &mut ActionExecutingContext) -> Result<()> {
        let controller = Arc::clone(&context.controller);
        match controller.as_action_filter() {
            Some(filter) => filter.on_action_executing(context).await,
            None => Ok(()),
        }
    }

    async fn on_action_executed(&self, context: &mut ActionExecutedContext) -> Result<()> {
        let controller = Arc::clone(&context.controller);
        match controller.as_action_filter() {
            Some(filter) => filter.on_action_executed(context).await,
            None => Ok(()),
        }
    }
}

/// Forwards result-filter hooks to the controller instance.
#[derive(Debug, Default, Clone, Copy)]
pub struct ControllerResultFilter;

impl FilterMetadata for ControllerResultFilter {
    fn order(&self) -> i32 {
        CONTROLLER_FILTER_ORDER
    }

    fn as_result_filter(&self) -> Option<&dyn ResultFilter> {
        Some(self)
    }
}

#[async_trait]
impl ResultFilter for ControllerResultFilter {
    async fn on_result_executing(&self, context: &mut ResultExecutingContext) -> Result<()> {
        let controller = Arc::clone(&context.controller);
        match controller.as_result_filter() {
            Some(filter) => filter.on_result_executing(context).await,
            None => Ok(()),
        }
    }

    async fn on_result_executed(&self, context: &mut ResultExecutedContext) -> Result<()> {
        let controller = Arc::clone(&context.controller);
        match controller.as_result_filter() {
            Some(filter) => filter.on_result_executed(context).await,
            None => Ok(()),
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// An ordered, executable filter list.
#[derive(Debug, Clone, Default)]
pub struct FilterPipeline {
    filters: Vec<Arc<dyn FilterMetadata>>,
}

impl FilterPipeline {
    /// Stable-sorts `filters` by [`FilterMetadata::order`].
    pub fn new<I>(filters: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn FilterMetadata>>,
    {
        let mut filters: Vec<_> = filters.into_iter().collect();
        filters.sort_by_key(|filter| filter.order());
        Self { filters }
    }

    pub fn filters(&self) -> &[Arc<dyn FilterMetadata>] {
        &self.filters
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run the filters around `action`.
    ///
    /// ```
    /// use girder_core::{HttpRequest, HttpResponse};
    /// use girder_discovery::{ActionExecutingContext, ControllerInstance, FilterPipeline};
    /// use std::sync::Arc;
    ///
    /// struct Home;
    /// impl ControllerInstance for Home {}
    ///
    /// # tokio_test::block_on(async {
    /// let pipeline = FilterPipeline::default();
    /// let context =
    ///     ActionExecutingContext::new(Arc::new(HttpRequest::new("GET", "/")), Arc::new(Home), "index");
    /// let response = pipeline
    ///     .execute(context, || async { Ok(HttpResponse::ok()) })
    ///     .await
    ///     .unwrap();
    /// assert_eq!(response.status, 200);
    /// # });
    /// ```
    pub async fn execute<F, Fut>(
        &self,
        mut context: ActionExecutingContext,
        action: F,
    ) -> Result<HttpResponse>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<HttpResponse>>,
    {
        let action_filters: Vec<&dyn ActionFilter> = self
            .filters
            .iter()
            .filter_map(|filter| filter.as_action_filter())
            .collect();

        let mut completed = 0;
        let mut short_circuit = None;
        for filter in &action_filters {
            filter.on_action_executing(&mut context).await?;
            if let Some(result) = context.result.take() {
                trace!(action = %context.action_name, "action short-circuited by filter");
                short_circuit = Some(result);
                break;
            }
            completed += 1;
        }

        let (result, canceled) = match short_circuit {
            Some(result) => (result, true),
            None => (action().await?, false),
        };

        let ActionExecutingContext {
            request,
            controller,
            action_name,
            ..
        } = context;
        let mut executed = ActionExecutedContext {
            request,
            controller,
            action_name,
            result,
            canceled,
        };
        for filter in action_filters[..completed].iter().rev() {
            filter.on_action_executed(&mut executed).await?;
        }

        self.execute_result_filters(executed).await
    }

    async fn execute_result_filters(
        &self,
        executed: ActionExecutedContext,
    ) -> Result<HttpResponse> {
        let result_filters: Vec<&dyn ResultFilter> = self
            .filters
            .iter()
            .filter_map(|filter| filter.as_result_filter())
            .collect();

        let mut context = ResultExecutingContext {
            request: executed.request,
            controller: executed.controller,
            action_name: executed.action_name,
            result: executed.result,
            cancel: false,
        };
        let mut completed = 0;
        for filter in &result_filters {
            filter.on_result_executing(&mut context).await?;
            completed += 1;
            if context.cancel {
                break;
            }
        }

        let mut executed = ResultExecutedContext {
            request: context.request,
            controller: context.controller,
            action_name: context.action_name,
            result: context.result,
            canceled: context.cancel,
        };
        for filter in result_filters[..completed].iter().rev() {
            filter.on_result_executed(&mut executed).await?;
        }
        Ok(executed.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    #[derive(Debug)]
    struct Recording {
        label: &'static str,
        order: i32,
        log: Log,
        short_circuit: bool,
    }

    impl Recording {
        fn new(label: &'static str, order: i32, log: &Log) -> Arc<dyn FilterMetadata> {
            Arc::new(Self {
                label,
                order,
                log: Arc::clone(log),
                short_circuit: false,
            })
        }
    }

    impl FilterMetadata for Recording {
        fn order(&self) -> i32 {
            self.order
        }

        fn as_action_filter(&self) -> Option<&dyn ActionFilter> {
            Some(self)
        }

        fn as_result_filter(&self) -> Option<&dyn ResultFilter> {
            Some(self)
        }
    }

    #[async_trait]
    impl ActionFilter for Recording {
        async fn on_action_executing(&self, context: &mut ActionExecutingContext) -> Result<()> {
            self.log.lock().unwrap().push(format!("{}:executing", self.label));
            if self.short_circuit {
                context.result = Some(HttpResponse::new(403));
            }
            Ok(())
        }

        async fn on_action_executed(&self, context: &mut ActionExecutedContext) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:executed:{}", self.label, context.canceled));
            Ok(())
        }
    }

    #[async_trait]
    impl ResultFilter for Recording {
        async fn on_result_executing(&self, _context: &mut ResultExecutingContext) -> Result<()> {
            self.log.lock().unwrap().push(format!("{}:result", self.label));
            Ok(())
        }
    }

    /// A controller that is its own action filter.
    struct SelfFiltering {
        log: Log,
    }

    impl ControllerInstance for SelfFiltering {
        fn as_action_filter(&self) -> Option<&dyn ActionFilter> {
            Some(self)
        }
    }

    #[async_trait]
    impl ActionFilter for SelfFiltering {
        async fn on_action_executing(&self, _context: &mut ActionExecutingContext) -> Result<()> {
            self.log.lock().unwrap().push("controller:executing".to_string());
            Ok(())
        }
    }

    struct Plain;

    impl ControllerInstance for Plain {}

    fn context(controller: Arc<dyn ControllerInstance>) -> ActionExecutingContext {
        ActionExecutingContext::new(Arc::new(HttpRequest::new("GET", "/")), controller, "index")
    }

    #[tokio::test]
    async fn test_filters_run_in_order_and_unwind_in_reverse() {
        let log: Log = Arc::default();
        let pipeline = FilterPipeline::new(vec![
            Recording::new("b", 10, &log),
            Recording::new("a", -5, &log),
            Recording::new("c", 10, &log),
        ]);

        let action_log = Arc::clone(&log);
        let response = pipeline
            .execute(context(Arc::new(Plain)), || async move {
                action_log.lock().unwrap().push("action".to_string());
                Ok(HttpResponse::ok())
            })
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:executing",
                "b:executing",
                "c:executing",
                "action",
                "c:executed:false",
                "b:executed:false",
                "a:executed:false",
                "a:result",
                "b:result",
                "c:result",
            ]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_action() {
        let log: Log = Arc::default();
        let guard: Arc<dyn FilterMetadata> = Arc::new(Recording {
            label: "guard",
            order: 0,
            log: Arc::clone(&log),
            short_circuit: true,
        });
        let pipeline = FilterPipeline::new(vec![Recording::new("outer", -1, &log), guard]);

        let response = pipeline
            .execute(context(Arc::new(Plain)), || async {
                Err(girder_core::Error::Internal("action ran".to_string()))
            })
            .await
            .unwrap();

        assert_eq!(response.status, 403);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "outer:executing",
                "guard:executing",
                "outer:executed:true",
                "outer:result",
                "guard:result",
            ]
        );
    }

    #[tokio::test]
    async fn test_controller_bridge_forwards_to_instance() {
        let log: Log = Arc::default();
        let pipeline = FilterPipeline::new(vec![
            Recording::new("attribute", 0, &log),
            Arc::new(ControllerActionFilter) as Arc<dyn FilterMetadata>,
        ]);
        let controller = Arc::new(SelfFiltering {
            log: Arc::clone(&log),
        });

        pipeline
            .execute(context(controller), || async { Ok(HttpResponse::ok()) })
            .await
            .unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log[0], "controller:executing");
        assert_eq!(log[1], "attribute:executing");
    }

    #[tokio::test]
    async fn test_bridge_is_noop_for_plain_controller() {
        let pipeline = FilterPipeline::new(vec![
            Arc::new(ControllerActionFilter) as Arc<dyn FilterMetadata>,
            Arc::new(ControllerResultFilter) as Arc<dyn FilterMetadata>,
        ]);
        let response = pipeline
            .execute(context(Arc::new(Plain)), || async { Ok(HttpResponse::new(204)) })
            .await
            .unwrap();
        assert_eq!(response.status, 204);
    }

    #[test]
    fn test_bridges_sort_first() {
        assert_eq!(ControllerActionFilter.order(), i32::MIN);
        assert_eq!(ControllerResultFilter.order(), i32::MIN);
        assert!(ControllerActionFilter.as_result_filter().is_none());
        assert!(ControllerResultFilter.as_action_filter().is_none());
    }
}
