//! Comments on posts.

use async_trait::async_trait;
use hatch_engine::Concept;
use hatch_foundation::{ActionRef, Error, IdMinter, QueryRef, Record, Result, record};
use im::OrdMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::now_millis;

#[derive(Clone, Debug)]
struct Comment {
    author: String,
    content: String,
    post: String,
    created_at: i64,
    seq: u64,
}

impl Comment {
    fn to_record(&self, id: &str) -> Record {
        record! {
            "comment" => id,
            "author" => self.author.as_str(),
            "content" => self.content.as_str(),
            "post" => self.post.as_str(),
            "createdAt" => self.created_at,
        }
    }
}

#[derive(Default)]
struct State {
    comments: OrdMap<String, Comment>,
    next_seq: u64,
}

/// The commenting concept.
pub struct Commenting {
    ids: IdMinter,
    state: RwLock<State>,
}

impl Commenting {
    /// Concept name.
    pub const NAME: &'static str = "Commenting";
    /// `addComment{author, content, post} → {comment}`
    pub const ADD_COMMENT: ActionRef = ActionRef::new(Self::NAME, "addComment");
    /// `editComment{user, comment, new_content} → {}`
    pub const EDIT_COMMENT: ActionRef = ActionRef::new(Self::NAME, "editComment");
    /// `deleteComment{user, comment} → {}`
    pub const DELETE_COMMENT: ActionRef = ActionRef::new(Self::NAME, "deleteComment");
    /// `deleteAllCommentsForPost{post} → {deleted}`
    pub const DELETE_ALL_FOR_POST: ActionRef =
        ActionRef::new(Self::NAME, "deleteAllCommentsForPost");
    /// `_getComment{comment} → [{comment, author, content, post, createdAt}]`
    pub const GET_COMMENT: QueryRef = QueryRef::new(Self::NAME, "_getComment");
    /// Comments on a post, oldest first.
    pub const GET_COMMENTS_FOR_POST: QueryRef = QueryRef::new(Self::NAME, "_getCommentsForPost");
    /// Comments by an author, oldest first.
    pub const GET_COMMENTS_BY_AUTHOR: QueryRef =
        QueryRef::new(Self::NAME, "_getCommentsByAuthor");

    /// Creates the concept.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ids(IdMinter::from_entropy())
    }

    /// Creates the concept with a specific id source.
    #[must_use]
    pub fn with_ids(ids: IdMinter) -> Self {
        Self {
            ids,
            state: RwLock::new(State::default()),
        }
    }

    fn add(&self, input: &Record) -> Record {
        let Some(author) = input.get_nonempty_str("author") else {
            return Record::error("Author must be provided.");
        };
        let Some(post) = input.get_nonempty_str("post") else {
            return Record::error("Post ID must be provided.");
        };
        let Some(content) = input.get_nonempty_str("content") else {
            return Record::error("Comment content cannot be empty.");
        };
        let comment = self.ids.uuid();
        let mut state = self.state.write();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.comments.insert(
            comment.clone(),
            Comment {
                author: author.to_string(),
                content: content.to_string(),
                post: post.to_string(),
                created_at: now_millis(),
                seq,
            },
        );
        debug!(comment = %comment, post, "comment added");
        record! { "comment" => comment }
    }

    fn authorize<'a>(state: &State, input: &'a Record) -> std::result::Result<&'a str, Record> {
        let user = input
            .get_nonempty_str("user")
            .ok_or_else(|| Record::error("User ID must be provided."))?;
        let comment = input
            .get_nonempty_str("comment")
            .ok_or_else(|| Record::error("Comment ID must be provided."))?;
        match state.comments.get(comment) {
            None => Err(Record::error(format!("Comment with ID '{comment}' not found."))),
            Some(existing) if existing.author != user => Err(Record::error(
                "Unauthorized: User is not the author of this comment.",
            )),
            Some(_) => Ok(comment),
        }
    }

    fn edit(&self, input: &Record) -> Record {
        let mut state = self.state.write();
        let comment = match Self::authorize(&state, input) {
            Ok(comment) => comment,
            Err(error) => return error,
        };
        let Some(content) = input.get_nonempty_str("new_content") else {
            return Record::error("Comment content cannot be empty.");
        };
        if let Some(existing) = state.comments.get_mut(comment) {
            existing.content = content.to_string();
        }
        Record::new()
    }

    fn delete(&self, input: &Record) -> Record {
        let mut state = self.state.write();
        match Self::authorize(&state, input) {
            Ok(comment) => {
                state.comments.remove(comment);
                Record::new()
            }
            Err(error) => error,
        }
    }

    fn delete_all_for_post(&self, input: &Record) -> Record {
        let Some(post) = input.get_nonempty_str("post") else {
            return Record::error("Post ID must be provided.");
        };
        let mut state = self.state.write();
        let before = state.comments.len();
        let kept: OrdMap<String, Comment> = state
            .comments
            .iter()
            .filter(|(_, c)| c.post != post)
            .map(|(id, c)| (id.clone(), c.clone()))
            .collect();
        state.comments = kept;
        let deleted = before - state.comments.len();
        debug!(post, deleted, "comments removed with post");
        record! { "deleted" => i64::try_from(deleted).unwrap_or(i64::MAX) }
    }

    fn matching(&self, keep: impl Fn(&Comment) -> bool) -> Vec<Record> {
        let state = self.state.read();
        let mut rows: Vec<_> = state.comments.iter().filter(|(_, c)| keep(c)).collect();
        rows.sort_by_key(|(_, c)| (c.created_at, c.seq));
        rows.into_iter().map(|(id, c)| c.to_record(id)).collect()
    }
}

impl Default for Commenting {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Concept for Commenting {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn actions(&self) -> &[&'static str] {
        &[
            "addComment",
            "editComment",
            "deleteComment",
            "deleteAllCommentsForPost",
        ]
    }

    fn queries(&self) -> &[&'static str] {
        &["_getComment", "_getCommentsForPost", "_getCommentsByAuthor"]
    }

    async fn perform(&self, action: &str, input: Record) -> Result<Record> {
        match action {
            "addComment" => Ok(self.add(&input)),
            "editComment" => Ok(self.edit(&input)),
            "deleteComment" => Ok(self.delete(&input)),
            "deleteAllCommentsForPost" => Ok(self.delete_all_for_post(&input)),
            _ => Err(Error::unknown_action(Self::NAME, action)),
        }
    }

    async fn query(&self, query: &str, input: Record) -> Result<Vec<Record>> {
        match query {
            "_getComment" => {
                let comment = input.require_str("comment")?;
                Ok(self
                    .state
                    .read()
                    .comments
                    .get(comment)
                    .map(|c| c.to_record(comment))
                    .into_iter()
                    .collect())
            }
            "_getCommentsForPost" => {
                let post = input.require_str("post")?;
                Ok(self.matching(|c| c.post == post))
            }
            "_getCommentsByAuthor" => {
                let author = input.require_str("author")?;
                Ok(self.matching(|c| c.author == author))
            }
            _ => Err(Error::unknown_query(Self::NAME, query)),
        }
    }
}
