//! Rule shapes shared by every request path.
//!
//! Most endpoints are three rules: forward the request's fields to a concept
//! action, answer the request with the action's error, and answer it with
//! the action's result. Error rules are registered ahead of the status
//! rules, whose empty output pattern also matches error outputs; the first
//! response to a request wins.

use hatch_concepts::Requesting;
use hatch_engine::{Fields, SyncBody, SyncRule, fields};
use hatch_foundation::ActionRef;

/// `Requesting.request` on `path`, matched once the request is recorded.
pub(crate) fn request_on(path: &'static str) -> Fields {
    fields! { "path" => path }
}

/// Forwards `path` requests to `action`, passing `args` through under the
/// same names.
pub(crate) fn forward(
    name: &str,
    path: &'static str,
    action: ActionRef,
    args: &[&'static str],
) -> SyncRule {
    SyncRule::define(name, |v| {
        let request = v.var("request");
        let mut input = request_on(path);
        let mut then = Fields::new();
        for arg in args {
            let var = v.var(arg);
            input = input.with(*arg, var);
            then = then.with(*arg, var);
        }
        SyncBody::new()
            .when_done(Requesting::REQUEST, input, fields! { "request" => request })
            .then(action, then)
    })
}

/// Answers `path` requests with `action`'s `{error}`.
pub(crate) fn respond_error(name: &str, path: &'static str, action: ActionRef) -> SyncRule {
    SyncRule::define(name, |v| {
        let [request, error] = v.vars(["request", "error"]);
        SyncBody::new()
            .when_done(Requesting::REQUEST, request_on(path), fields! { "request" => request })
            .when_done(action, fields! {}, fields! { "error" => error })
            .then(
                Requesting::RESPOND,
                fields! { "request" => request, "error" => error },
            )
    })
}

/// Answers `path` requests with fields of `action`'s output, each pair
/// naming the output field and the response field.
pub(crate) fn respond_with(
    name: &str,
    path: &'static str,
    action: ActionRef,
    fields: &[(&'static str, &'static str)],
) -> SyncRule {
    SyncRule::define(name, |v| {
        let request = v.var("request");
        let mut output = Fields::new();
        let mut response = fields! { "request" => request };
        for (from, to) in fields {
            let var = v.var(to);
            output = output.with(*from, var);
            response = response.with(*to, var);
        }
        SyncBody::new()
            .when_done(Requesting::REQUEST, request_on(path), fields! { "request" => request })
            .when_done(action, fields! {}, output)
            .then(Requesting::RESPOND, response)
    })
}

/// Answers `path` requests with a fixed status once `action` completes.
pub(crate) fn respond_status(
    name: &str,
    path: &'static str,
    action: ActionRef,
    status: &'static str,
) -> SyncRule {
    SyncRule::define(name, |v| {
        let request = v.var("request");
        SyncBody::new()
            .when_done(Requesting::REQUEST, request_on(path), fields! { "request" => request })
            .when_done(action, fields! {}, fields! {})
            .then(
                Requesting::RESPOND,
                fields! { "request" => request, "status" => status },
            )
    })
}
