//! Posts with images and a caption.

use async_trait::async_trait;
use hatch_engine::Concept;
use hatch_foundation::{ActionRef, Error, IdMinter, List, QueryRef, Record, Result, record};
use im::OrdMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::now_millis;

#[derive(Clone, Debug)]
struct Post {
    author: String,
    caption: String,
    images: List,
    created_at: i64,
    seq: u64,
}

impl Post {
    fn to_record(&self, id: &str) -> Record {
        record! {
            "post" => id,
            "author" => self.author.as_str(),
            "caption" => self.caption.as_str(),
            "images" => self.images.clone(),
            "createdAt" => self.created_at,
        }
    }
}

#[derive(Default)]
struct State {
    posts: OrdMap<String, Post>,
    next_seq: u64,
}

/// The posting concept.
pub struct Posting {
    ids: IdMinter,
    state: RwLock<State>,
}

impl Posting {
    /// Concept name.
    pub const NAME: &'static str = "Posting";
    /// `create{user, images, caption} → {post}`
    pub const CREATE: ActionRef = ActionRef::new(Self::NAME, "create");
    /// `edit{user, post, new_caption} → {}`
    pub const EDIT: ActionRef = ActionRef::new(Self::NAME, "edit");
    /// `delete{user, post} → {}`
    pub const DELETE: ActionRef = ActionRef::new(Self::NAME, "delete");
    /// `_getPostById{post} → [{postDetails}]`
    pub const GET_POST_BY_ID: QueryRef = QueryRef::new(Self::NAME, "_getPostById");
    /// `_getPostsByAuthor{user} → [{post, author, caption, images, createdAt}]`,
    /// most recent first
    pub const GET_POSTS_BY_AUTHOR: QueryRef = QueryRef::new(Self::NAME, "_getPostsByAuthor");

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

    fn create(&self, input: &Record) -> Record {
        let Some(user) = input.get_nonempty_str("user") else {
            return Record::error("User ID must be provided.");
        };
        let images = match input.get_list("images") {
            Some(images) if !images.is_empty() => images.clone(),
            _ => return Record::error("Images cannot be empty for a post."),
        };
        let Some(caption) = input.get_str("caption") else {
            return Record::error("Caption cannot be undefined.");
        };

        let post = self.ids.uuid();
        let mut state = self.state.write();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.posts.insert(
            post.clone(),
            Post {
                author: user.to_string(),
                caption: caption.to_string(),
                images,
                created_at: now_millis(),
                seq,
            },
        );
        debug!(post = %post, author = user, "post created");
        record! { "post" => post }
    }

    /// Checks the shared edit/delete preconditions and hands back the post id.
    fn authorize<'a>(state: &State, input: &'a Record) -> std::result::Result<&'a str, Record> {
        let user = input
            .get_nonempty_str("user")
            .ok_or_else(|| Record::error("User ID must be provided."))?;
        let post = input
            .get_nonempty_str("post")
            .ok_or_else(|| Record::error("Post ID must be provided."))?;
        match state.posts.get(post) {
            None => Err(Record::error(format!("Post with ID '{post}' not found."))),
            Some(existing) if existing.author != user => Err(Record::error(
                "Unauthorized: User is not the author of this post.",
            )),
            Some(_) => Ok(post),
        }
    }

    fn edit(&self, input: &Record) -> Record {
        let mut state = self.state.write();
        let post = match Self::authorize(&state, input) {
            Ok(post) => post,
            Err(error) => return error,
        };
        let Some(caption) = input.get_str("new_caption") else {
            return Record::error("New caption cannot be undefined.");
        };
        if let Some(existing) = state.posts.get_mut(post) {
            existing.caption = caption.to_string();
        }
        Record::new()
    }

    fn delete(&self, input: &Record) -> Record {
        let mut state = self.state.write();
        match Self::authorize(&state, input) {
            Ok(post) => {
                state.posts.remove(post);
                debug!(post, "post deleted");
                Record::new()
            }
            Err(error) => error,
        }
    }

    fn by_id(&self, post: &str) -> Vec<Record> {
        self.state
            .read()
            .posts
            .get(post)
            .map(|p| record! { "postDetails" => p.to_record(post) })
            .into_iter()
            .collect()
    }

    fn by_author(&self, author: &str) -> Vec<Record> {
        let state = self.state.read();
        let mut posts: Vec<_> = state
            .posts
            .iter()
            .filter(|(_, p)| p.author == author)
            .collect();
        posts.sort_by(|(_, a), (_, b)| (b.created_at, b.seq).cmp(&(a.created_at, a.seq)));
        posts.into_iter().map(|(id, p)| p.to_record(id)).collect()
    }
}

impl Default for Posting {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Concept for Posting {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn actions(&self) -> &[&'static str] {
        &["create", "edit", "delete"]
    }

    fn queries(&self) -> &[&'static str] {
        &["_getPostById", "_getPostsByAuthor"]
    }

    async fn perform(&self, action: &str, input: Record) -> Result<Record> {
        match action {
            "create" => Ok(self.create(&input)),
            "edit" => Ok(self.edit(&input)),
            "delete" => Ok(self.delete(&input)),
            _ => Err(Error::unknown_action(Self::NAME, action)),
        }
    }

    async fn query(&self, query: &str, input: Record) -> Result<Vec<Record>> {
        match query {
            "_getPostById" => Ok(self.by_id(input.require_str("post")?)),
            "_getPostsByAuthor" => Ok(self.by_author(input.require_str("user")?)),
            _ => Err(Error::unknown_query(Self::NAME, query)),
        }
    }
}
