use std::rc::Rc;

use async_trait::async_trait;

use crate::{
    api::{
        Backend, Card, CardId, CardVote, Comment, CommentId, CommentPage, CommentQuery,
        EditComment, Error, NewCard, NewComment, Reaction, Tag, TagId,
    },
    session::Session,
};

/// `Backend` over HTTP, one reqwest call per route. Routes that need a
/// session get their bearer token from the `Session` at call time, so a
/// login or logout between two calls is picked up without rebuilding the
/// client.
pub struct HttpBackend {
    base: String,
    client: reqwest::Client,
    session: Rc<dyn Session>,
}

impl HttpBackend {
    pub fn new(base: impl Into<String>, session: Rc<dyn Session>) -> HttpBackend {
        HttpBackend {
            base: base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            session,
        }
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session.access_token() {
            Some(token) => req.bearer_auth(token.0),
            None => req,
        }
    }

    /// Sends the request and returns the raw body of a 2xx response.
    /// Non-2xx turns into `Error::Api` with the backend's `message` field
    /// when the body carries one.
    async fn send(&self, req: reqwest::RequestBuilder, path: &str) -> Result<Vec<u8>, Error> {
        let resp = self
            .authed(req)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::from_response(status.as_u16(), path, &body));
        }
        Ok(body.to_vec())
    }

    async fn fetch<T>(&self, req: reqwest::RequestBuilder, path: &str) -> Result<T, Error>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let body = self.send(req, path).await?;
        serde_json::from_slice(&body).map_err(|e| Error::BadBody(e.to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

#[async_trait(?Send)]
impl Backend for HttpBackend {
    async fn list_cards(&self, page: u32) -> Result<Vec<Card>, Error> {
        let path = format!("/card/{page}");
        self.fetch(self.client.get(self.url(&path)), &path).await
    }

    async fn list_cards_in_tag(&self, tag: TagId, page: u32) -> Result<Vec<Card>, Error> {
        let path = format!("/card/tag/{}/{}", tag.0, page);
        self.fetch(self.client.get(self.url(&path)), &path).await
    }

    async fn fetch_card(&self, card: CardId) -> Result<Card, Error> {
        let path = format!("/card/detail/{}", card.0);
        self.fetch(self.client.get(self.url(&path)), &path).await
    }

    async fn create_card(&self, card: NewCard) -> Result<Card, Error> {
        let path = "/card";
        self.fetch(self.client.post(self.url(path)).json(&card), path)
            .await
    }

    async fn vote_card(&self, card: CardId, is_upvote: bool) -> Result<(), Error> {
        let path = "/card";
        let body = CardVote::new(card, is_upvote);
        // the response body is the raw vote row; nothing in it is needed
        self.send(self.client.patch(self.url(path)).json(&body), path)
            .await?;
        Ok(())
    }

    async fn delete_card(&self, card: CardId) -> Result<(), Error> {
        let path = format!("/card/{}", card.0);
        self.send(self.client.delete(self.url(&path)), &path).await?;
        Ok(())
    }

    async fn list_comments(
        &self,
        card: CardId,
        query: CommentQuery,
    ) -> Result<CommentPage, Error> {
        let path = format!("/commentary/{}", card.0);
        let mut params = Vec::new();
        if let Some(parent) = query.parent {
            params.push(("parentId", parent.0.to_string()));
        }
        if let Some(page) = query.page {
            params.push(("page", page.to_string()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        self.fetch(self.client.get(self.url(&path)).query(&params), &path)
            .await
    }

    async fn create_comment(&self, card: CardId, comment: NewComment) -> Result<Comment, Error> {
        let path = format!("/commentary/{}", card.0);
        self.fetch(self.client.post(self.url(&path)).json(&comment), &path)
            .await
    }

    async fn edit_comment(
        &self,
        card: CardId,
        comment: CommentId,
        edit: EditComment,
    ) -> Result<Comment, Error> {
        let path = format!("/commentary/{}/{}", card.0, comment.0);
        self.fetch(self.client.patch(self.url(&path)).json(&edit), &path)
            .await
    }

    async fn delete_comment(&self, card: CardId, comment: CommentId) -> Result<(), Error> {
        let path = format!("/commentary/{}/{}", card.0, comment.0);
        self.send(self.client.delete(self.url(&path)), &path).await?;
        Ok(())
    }

    async fn react_to_comment(
        &self,
        card: CardId,
        comment: CommentId,
        is_upvote: bool,
    ) -> Result<(), Error> {
        let path = "/commentary";
        let body = Reaction::new(card, comment, is_upvote);
        self.send(self.client.patch(self.url(path)).json(&body), path)
            .await?;
        Ok(())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, Error> {
        let path = "/tags";
        self.fetch(self.client.get(self.url(path)), path).await
    }
}
