/// Sends the user back to an unauthenticated entry point once the session is
/// gone for good.
pub trait LoginRedirect: Send + Sync + std::fmt::Debug + 'static {
    fn redirect(&self, route: &str);
}

/// Terminal flavour: there is no page to navigate to, so tell the user what
/// to run instead.
#[derive(Debug, Default)]
pub struct StderrLoginRedirect;

impl LoginRedirect for StderrLoginRedirect {
    fn redirect(&self, route: &str) {
        tracing::debug!("Redirecting to {route}");
        eprintln!("Your session has expired. Run `schoolhub login` to sign in again.");
    }
}

#[derive(Debug, Default)]
pub struct NoopLoginRedirect;

impl LoginRedirect for NoopLoginRedirect {
    fn redirect(&self, route: &str) {
        tracing::debug!("Ignoring redirect to {route}");
    }
}
