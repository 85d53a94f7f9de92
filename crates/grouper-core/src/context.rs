/// Per-request execution context.
///
/// Carries the tenant every store query is scoped by. The handler layer
/// builds one after authentication and threads it through each service
/// call; nothing below the services can issue SQL without it, which is
/// what keeps a call site from forgetting to scope a query.
///
/// Cancellation rides on the async runtime rather than on this type:
/// dropping the future of an in-flight call aborts the statement it is
/// waiting on, including a blocked row-lock acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    tenant: String,
}

impl RequestContext {
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
        }
    }

    /// Name of the tenant this request executes under.
    pub fn tenant(&self) -> &str {
        &self.tenant
    }
}
