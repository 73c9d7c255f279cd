//! Shared test doubles: a `PageEvents` stub that never actually touches a
//! page, and an `Adapter` stub returning scripted outcomes while recording
//! invocation order — enough to drive the pool/worker/registry stack
//! end-to-end without a real browser.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use browserchat_gateway::adapter::{
    Adapter, GenerateContext, GenerateMeta, GenerateOutcome, ImagePolicy, ModelDescriptor, NavigationHandler,
    WorkerTargetParams,
};
use browserchat_gateway::error::ErrorRecord;
use browserchat_gateway::page::{ApiResponse, ApiWaitSpec, AuthLock, CookieRecord, PageEvents, PageHandle, PageId};
use browserchat_gateway::worker::{Worker, WorkerKind};
use url::Url;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub struct NoopPageEvents;

impl PageEvents for NoopPageEvents {
    fn closed<'a>(&'a self) -> BoxFuture<'a, ()> {
        Box::pin(std::future::pending())
    }
    fn crashed<'a>(&'a self) -> BoxFuture<'a, ()> {
        Box::pin(std::future::pending())
    }
    fn navigate<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, Result<u16, ErrorRecord>> {
        Box::pin(async { Ok(200) })
    }
    fn await_response<'a>(&'a self, _spec: &'a ApiWaitSpec) -> BoxFuture<'a, Result<ApiResponse, ErrorRecord>> {
        Box::pin(async { Ok(ApiResponse { status: 200, body: String::new() }) })
    }
    fn page_text<'a>(&'a self) -> BoxFuture<'a, String> {
        Box::pin(async { String::new() })
    }
    fn move_mouse_away<'a>(&'a self) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
    fn cookies<'a>(&'a self, _domain: Option<&'a str>) -> BoxFuture<'a, Vec<CookieRecord>> {
        Box::pin(async { Vec::new() })
    }
}

/// An adapter that always returns one canned outcome and records its id
/// into a shared invocation log, in call order.
pub struct ScriptedAdapter {
    pub id: String,
    pub models: Vec<ModelDescriptor>,
    pub outcome: GenerateOutcome,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl Adapter for ScriptedAdapter {
    fn id(&self) -> &str {
        &self.id
    }
    fn display_name(&self) -> &str {
        &self.id
    }
    fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }
    fn navigation_handlers(&self) -> &[Arc<dyn NavigationHandler>] {
        &[]
    }
    fn target_url(&self, _params: &WorkerTargetParams) -> Result<Url, ErrorRecord> {
        Ok(Url::parse("https://example.invalid").unwrap())
    }
    fn generate<'a>(
        &'a self,
        _ctx: &'a GenerateContext<'a>,
        _prompt: &'a str,
        _image_refs: &'a [PathBuf],
        _model_id: &'a str,
        _meta: &'a GenerateMeta,
    ) -> BoxFuture<'a, GenerateOutcome> {
        self.log.lock().unwrap().push(self.id.clone());
        let outcome = self.outcome.clone();
        Box::pin(async move { outcome })
    }
}

static NEXT_PAGE_ID: AtomicU64 = AtomicU64::new(1);

pub fn make_worker(name: &str, adapter_id: &str) -> Arc<Worker> {
    let id = PageId::new(NEXT_PAGE_ID.fetch_add(1, Ordering::SeqCst));
    let page = PageHandle::new(id, Arc::new(NoopPageEvents), AuthLock::new());
    Worker::new(
        name.to_string(),
        WorkerKind::Single(adapter_id.to_string()),
        "default".to_string(),
        PathBuf::from("/tmp/browserchat-test"),
        None,
        page,
    )
}
