use std::{cell::RefCell, rc::Rc, time::Duration};

use agora_client::{
    api::{CardId, CommentId, Error, Time, UserUid},
    CardThread, Comment, Direction, FixedSession, VoteState,
};
use agora_mock_server::{MockBackend, MockServer};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use tokio::task::LocalSet;

fn at(n: i64) -> Time {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap() + ChronoDuration::seconds(n)
}

struct Seeded {
    server: Rc<RefCell<MockServer>>,
    card: CardId,
    early_root: CommentId,
    late_root: CommentId,
    reply: CommentId,
}

/// A card with three comments: a root at t=5, a root at t=10 and a reply
/// to the latter at t=20.
fn seed() -> Seeded {
    let server = Rc::new(RefCell::new(MockServer::new()));
    let card = {
        let mut s = server.borrow_mut();
        s.add_card(None, "the question", "body", at(0))
    };
    let (early_root, late_root, reply) = {
        let mut s = server.borrow_mut();
        let early = s.add_comment(card, None, None, "first", at(5));
        let late = s.add_comment(card, None, None, "second", at(10));
        let reply = s.add_comment(card, None, Some(late), "a reply", at(20));
        (early, late, reply)
    };
    Seeded {
        server,
        card,
        early_root,
        late_root,
        reply,
    }
}

fn logged_in_thread(
    server: &Rc<RefCell<MockServer>>,
    card: CardId,
    name: &str,
) -> (CardThread<MockBackend>, UserUid) {
    let uid = server.borrow_mut().create_user(name);
    let token = server.borrow_mut().auth(&uid);
    let backend = Rc::new(MockBackend::new(server.clone(), Some(token.clone())));
    let session = Rc::new(FixedSession::logged_in(uid.clone(), token));
    (CardThread::new(backend, session, card), uid)
}

fn anonymous_thread(server: &Rc<RefCell<MockServer>>, card: CardId) -> CardThread<MockBackend> {
    let backend = Rc::new(MockBackend::new(server.clone(), None));
    CardThread::new(backend, Rc::new(FixedSession::anonymous()), card)
}

#[tokio::test(start_paused = true)]
async fn load_builds_the_forest_in_time_order() {
    LocalSet::new()
        .run_until(async {
            let s = seed();
            let thread = anonymous_thread(&s.server, s.card);

            thread.load().await;
            assert_eq!(thread.post().unwrap().title, "the question");

            thread.reload_comments().await;
            let comments = thread.comments();
            assert_eq!(comments.len(), 2);
            assert_eq!(comments[0].id, s.early_root);
            assert_eq!(comments[1].id, s.late_root);
            assert_eq!(comments[1].replies.len(), 1);
            assert_eq!(comments[1].replies[0].id, s.reply);
            // the count comes from the server total, replies included
            assert_eq!(thread.post().unwrap().comment_count, 3);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn loading_a_missing_card_reports_the_error() {
    LocalSet::new()
        .run_until(async {
            let server = Rc::new(RefCell::new(MockServer::new()));
            let thread = anonymous_thread(&server, CardId(99));
            thread.load().await;
            assert!(thread.post().is_none());
            assert_eq!(thread.load_error().as_deref(), Some("Card not found"));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn official_roots_partition_from_the_rest() {
    LocalSet::new()
        .run_until(async {
            let s = seed();
            s.server.borrow_mut().set_official(s.early_root);
            let thread = anonymous_thread(&s.server, s.card);
            thread.reload_comments().await;

            let official = thread.official_comments();
            assert_eq!(official.len(), 1);
            assert_eq!(official[0].id, s.early_root);
            assert!(official[0].official);

            let regular = thread.regular_comments();
            assert_eq!(regular.len(), 1);
            assert_eq!(regular[0].id, s.late_root);
            // replies ride along with their root
            assert_eq!(regular[0].replies[0].id, s.reply);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn overlapping_reloads_hit_the_network_once() {
    LocalSet::new()
        .run_until(async {
            let s = seed();
            let thread = anonymous_thread(&s.server, s.card);

            futures::join!(thread.reload_comments(), thread.reload_comments());

            assert_eq!(s.server.borrow().calls().list_comments, 1);
            assert_eq!(thread.comments().len(), 2);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn comment_vote_lands_on_a_nested_node() {
    LocalSet::new()
        .run_until(async {
            let s = seed();
            let (thread, _uid) = logged_in_thread(&s.server, s.card, "alice");
            thread.reload_comments().await;

            thread.vote_comment(s.reply, Direction::Up).await;

            let comments = thread.comments();
            let node = Comment::find_in(&comments, s.reply).unwrap();
            assert_eq!(node.score, 1);
            assert_eq!(node.user_vote, VoteState::Up);
            assert_eq!(s.server.borrow().calls().react_to_comment, 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn refused_comment_vote_rolls_back_and_clears_its_banner() {
    LocalSet::new()
        .run_until(async {
            let s = seed();
            let thread = anonymous_thread(&s.server, s.card);
            thread.reload_comments().await;

            thread.vote_comment(s.late_root, Direction::Down).await;

            let comments = thread.comments();
            let node = Comment::find_in(&comments, s.late_root).unwrap();
            assert_eq!(node.score, 0);
            assert_eq!(node.user_vote, VoteState::None);
            assert_eq!(
                thread.comment_error(s.late_root).as_deref(),
                Some("You need to be signed in to do that.")
            );

            tokio::time::sleep(Duration::from_millis(3100)).await;
            assert!(thread.comment_error(s.late_root).is_none());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn votes_on_soft_deleted_comments_never_leave_the_client() {
    LocalSet::new()
        .run_until(async {
            let s = seed();
            s.server.borrow_mut().deactivate_comment(s.late_root);
            let (thread, _uid) = logged_in_thread(&s.server, s.card, "alice");
            thread.reload_comments().await;

            thread.vote_comment(s.late_root, Direction::Up).await;
            assert_eq!(s.server.borrow().calls().react_to_comment, 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn replies_to_soft_deleted_comments_never_leave_the_client() {
    LocalSet::new()
        .run_until(async {
            let s = seed();
            s.server.borrow_mut().deactivate_comment(s.late_root);
            let (thread, _uid) = logged_in_thread(&s.server, s.card, "alice");
            thread.reload_comments().await;

            thread.reply(s.late_root, "too late".to_string()).await;

            assert_eq!(s.server.borrow().calls().create_comment, 0);
            let comments = thread.comments();
            assert_eq!(
                Comment::find_in(&comments, s.late_root).unwrap().replies.len(),
                1
            );
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn concurrent_comment_votes_hit_the_network_once() {
    LocalSet::new()
        .run_until(async {
            let s = seed();
            let (thread, _uid) = logged_in_thread(&s.server, s.card, "alice");
            thread.reload_comments().await;

            futures::join!(
                thread.vote_comment(s.early_root, Direction::Up),
                thread.vote_comment(s.early_root, Direction::Up)
            );

            assert_eq!(s.server.borrow().calls().react_to_comment, 1);
            let comments = thread.comments();
            assert_eq!(Comment::find_in(&comments, s.early_root).unwrap().score, 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn submitted_comment_is_merged_and_counted() {
    LocalSet::new()
        .run_until(async {
            let s = seed();
            let (thread, _uid) = logged_in_thread(&s.server, s.card, "alice");
            thread.load().await;
            thread.reload_comments().await;

            // whitespace never reaches the network
            thread.submit_comment("   \n".to_string()).await;
            assert_eq!(s.server.borrow().calls().create_comment, 0);

            thread.submit_comment("my two cents".to_string()).await;
            let comments = thread.comments();
            assert_eq!(comments.len(), 3);
            assert_eq!(comments[2].content, "my two cents");
            assert_eq!(thread.post().unwrap().comment_count, 4);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn anonymous_submission_banners_without_touching_the_forest() {
    LocalSet::new()
        .run_until(async {
            let s = seed();
            let thread = anonymous_thread(&s.server, s.card);
            thread.reload_comments().await;

            thread.submit_comment("hello".to_string()).await;

            assert_eq!(thread.comments().len(), 2);
            assert_eq!(
                thread.compose_error().as_deref(),
                Some("You need to be signed in to do that.")
            );
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn reply_is_spliced_under_its_parent() {
    LocalSet::new()
        .run_until(async {
            let s = seed();
            let (thread, _uid) = logged_in_thread(&s.server, s.card, "alice");
            thread.load().await;
            thread.reload_comments().await;

            thread.reply(s.late_root, "me too".to_string()).await;

            let comments = thread.comments();
            let parent = Comment::find_in(&comments, s.late_root).unwrap();
            assert_eq!(parent.replies.len(), 2);
            assert_eq!(parent.replies[1].content, "me too");
            assert_eq!(thread.post().unwrap().comment_count, 4);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn deleting_a_comment_soft_deletes_and_keeps_children() {
    LocalSet::new()
        .run_until(async {
            let server = Rc::new(RefCell::new(MockServer::new()));
            let card = server.borrow_mut().add_card(None, "q", "body", at(0));
            let (thread, uid) = logged_in_thread(&server, card, "alice");
            let (mine, child) = {
                let mut s = server.borrow_mut();
                let mine = s.add_comment(card, Some(&uid), None, "mine", at(5));
                let child = s.add_comment(card, None, Some(mine), "child", at(10));
                (mine, child)
            };
            thread.reload_comments().await;
            assert!(thread.can_delete_comment(mine));
            assert!(!thread.can_delete_comment(child));

            thread.request_delete_comment(mine);
            assert_eq!(thread.delete_target(), Some(mine));
            thread.confirm_delete_comment().await;

            assert!(thread.delete_target().is_none());
            assert!(server.borrow().comment_is_deactivated(mine));
            let comments = thread.comments();
            let node = Comment::find_in(&comments, mine).unwrap();
            assert!(node.deactivated);
            assert_eq!(node.replies.len(), 1);
            assert_eq!(node.replies[0].id, child);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn refused_comment_delete_restores_the_forest() {
    LocalSet::new()
        .run_until(async {
            let server = Rc::new(RefCell::new(MockServer::new()));
            let card = server.borrow_mut().add_card(None, "q", "body", at(0));
            let (thread, uid) = logged_in_thread(&server, card, "alice");
            let mine = server
                .borrow_mut()
                .add_comment(card, Some(&uid), None, "mine", at(5));
            thread.reload_comments().await;

            thread.request_delete_comment(mine);
            server
                .borrow_mut()
                .fail_next_with(Error::api(500, "Internal server error"));
            thread.confirm_delete_comment().await;

            let comments = thread.comments();
            assert!(!Comment::find_in(&comments, mine).unwrap().deactivated);
            assert_eq!(
                thread.delete_error().as_deref(),
                Some("Something went wrong. Please try again.")
            );
            assert!(!thread.is_deleting());
            assert!(!server.borrow().comment_is_deactivated(mine));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn edited_comment_content_shows_after_reload() {
    LocalSet::new()
        .run_until(async {
            use agora_client::api::{Backend, EditComment};

            let server = Rc::new(RefCell::new(MockServer::new()));
            let card = server.borrow_mut().add_card(None, "q", "body", at(0));
            let uid = server.borrow_mut().create_user("alice");
            let token = server.borrow_mut().auth(&uid);
            let mine = server
                .borrow_mut()
                .add_comment(card, Some(&uid), None, "tpyo", at(5));
            let backend = Rc::new(MockBackend::new(server.clone(), Some(token.clone())));
            let session = Rc::new(FixedSession::logged_in(uid, token));
            let thread = CardThread::new(backend.clone(), session, card);

            let edited = backend
                .edit_comment(
                    card,
                    mine,
                    EditComment {
                        content: "typo".to_string(),
                    },
                )
                .await
                .unwrap();
            assert_eq!(edited.content, "typo");

            thread.reload_comments().await;
            let comments = thread.comments();
            assert_eq!(Comment::find_in(&comments, mine).unwrap().content, "typo");

            // someone else's comment stays out of reach
            let other_uid = server.borrow_mut().create_user("bob");
            let other_token = server.borrow_mut().auth(&other_uid);
            let other = Rc::new(MockBackend::new(server.clone(), Some(other_token)));
            let refused = other
                .edit_comment(
                    card,
                    mine,
                    EditComment {
                        content: "vandalism".to_string(),
                    },
                )
                .await;
            assert_eq!(refused, Err(Error::api(403, "Forbidden")));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn post_vote_on_the_detail_page_rolls_back_when_refused() {
    LocalSet::new()
        .run_until(async {
            let s = seed();
            s.server.borrow_mut().set_card_score(s.card, 7);
            let thread = anonymous_thread(&s.server, s.card);
            thread.load().await;

            thread.vote_post(Direction::Up).await;

            let post = thread.post().unwrap();
            assert_eq!(post.score, 7);
            assert_eq!(post.user_vote, VoteState::None);
            assert_eq!(
                thread.post_vote_error().as_deref(),
                Some("You need to be signed in to do that.")
            );
        })
        .await;
}
