//! Posts, and the cascade that clears a deleted post's comments.

use async_trait::async_trait;
use hatch_concepts::{Commenting, Posting, Requesting, SessionLogging};
use hatch_engine::{Frames, Refine, RefineContext, SyncBody, SyncRule, Where, fields};
use hatch_foundation::{QueryRef, Record, Var};
use tracing::warn;

use crate::common::{forward, request_on, respond_error, respond_status, respond_with};

/// Plain create path.
pub const CREATE: &str = "/Posting/create";
/// Plain edit path.
pub const EDIT: &str = "/Posting/edit";
/// Plain delete path.
pub const DELETE: &str = "/Posting/delete";
/// Session-authenticated create path.
pub const API_CREATE: &str = "/api/Posting/create";
/// Session-authenticated delete path.
pub const API_DELETE: &str = "/api/Posting/delete";

/// Posting rules.
#[must_use]
pub fn rules() -> Vec<SyncRule> {
    vec![
        forward(
            "CreatePostPlainRequest",
            CREATE,
            Posting::CREATE,
            &["user", "images", "caption"],
        ),
        respond_error("CreatePostPlainError", CREATE, Posting::CREATE),
        respond_with("CreatePostPlainResponse", CREATE, Posting::CREATE, &[("post", "post")]),
        forward(
            "EditPostPlainRequest",
            EDIT,
            Posting::EDIT,
            &["user", "post", "new_caption"],
        ),
        respond_error("EditPostPlainError", EDIT, Posting::EDIT),
        respond_status("EditPostPlainResponse", EDIT, Posting::EDIT, "success"),
        forward("DeletePostPlainRequest", DELETE, Posting::DELETE, &["user", "post"]),
        respond_error("DeletePostPlainError", DELETE, Posting::DELETE),
        respond_status("DeletePostPlainResponse", DELETE, Posting::DELETE, "success"),
        create_by_session(),
        respond_error("CreatePostResponseError", API_CREATE, Posting::CREATE),
        respond_with("CreatePostResponse", API_CREATE, Posting::CREATE, &[("post", "post")]),
        delete_by_session(),
        respond_error("DeletePostResponseError", API_DELETE, Posting::DELETE),
        respond_status("DeletePostResponse", API_DELETE, Posting::DELETE, "success"),
        cascade_to_comments(),
    ]
}

fn create_by_session() -> SyncRule {
    SyncRule::define("CreatePostRequest", |v| {
        let [request, session, images, caption, user] =
            v.vars(["request", "session", "images", "caption", "user"]);
        SyncBody::new()
            .when_done(
                Requesting::REQUEST,
                request_on(API_CREATE)
                    .with("session", session)
                    .with("images", images)
                    .with("caption", caption),
                fields! { "request" => request },
            )
            .refine(Where::new().query(
                SessionLogging::GET_USER,
                fields! { "session" => session },
                fields! { "user" => user },
            ))
            .then(
                Posting::CREATE,
                fields! { "user" => user, "images" => images, "caption" => caption },
            )
    })
}

/// Only the post's author may delete it through a session.
fn delete_by_session() -> SyncRule {
    SyncRule::define("DeletePostRequest", |v| {
        let [request, session, post, user, details] =
            v.vars(["request", "session", "post", "user", "postDetails"]);
        SyncBody::new()
            .when_done(
                Requesting::REQUEST,
                request_on(API_DELETE)
                    .with("session", session)
                    .with("post", post),
                fields! { "request" => request },
            )
            .refine(
                Where::new()
                    .query(
                        SessionLogging::GET_USER,
                        fields! { "session" => session },
                        fields! { "user" => user },
                    )
                    .query(
                        Posting::GET_POST_BY_ID,
                        fields! { "post" => post },
                        fields! { "postDetails" => details },
                    )
                    .filter(move |f| {
                        let author = f
                            .get(details)
                            .and_then(|d| d.as_record())
                            .and_then(|d| d.get_str("author"));
                        author.is_some() && author == f.get_str(user)
                    }),
            )
            .then(Posting::DELETE, fields! { "user" => user, "post" => post })
    })
}

/// Keeps frames whose post no longer exists.
///
/// A `delete` completion with an `{error}` output also matches an empty
/// output pattern, so the cascade checks the post is actually gone.
struct PostGone {
    post: Var,
}

#[async_trait]
impl Refine for PostGone {
    async fn refine(&self, frames: Frames, cx: &RefineContext<'_>) -> Frames {
        let mut kept = Frames::new();
        for frame in frames {
            let Some(post) = frame.get(self.post).cloned() else {
                continue;
            };
            let input = Record::new().with("post", post);
            match cx.source.query(&Posting::GET_POST_BY_ID, input).await {
                Ok(rows) if rows.is_empty() => kept.push(frame),
                Ok(_) => {}
                Err(e) => {
                    warn!(rule = cx.rule, error = %e, "post lookup failed, dropping frame");
                }
            }
        }
        kept
    }

    fn queries(&self) -> Vec<QueryRef> {
        vec![Posting::GET_POST_BY_ID]
    }
}

fn cascade_to_comments() -> SyncRule {
    SyncRule::define("PostDeletionCascadeToComments", |v| {
        let post = v.var("post");
        SyncBody::new()
            .when_done(Posting::DELETE, fields! { "post" => post }, fields! {})
            .refine(PostGone { post })
            .then(Commenting::DELETE_ALL_FOR_POST, fields! { "post" => post })
    })
}
