//! Registration, login and user lookups.

use hatch_foundation::record;
use hatch_syncs::{accounts, reads};

use crate::support::{app, column, ok, register, rejected, string};

#[tokio::test]
async fn registered_user_can_log_in() {
    let app = app();
    let user = register(&app, "ada").await;

    let login = ok(
        &app,
        accounts::AUTHENTICATE,
        record! { "username" => "ada", "password" => "secret" },
    )
    .await;
    assert_eq!(string(&login, "user"), user);

    let error = rejected(
        &app,
        accounts::AUTHENTICATE,
        record! { "username" => "ada", "password" => "wrong" },
    )
    .await;
    assert_eq!(error, "Invalid username or password.");
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let app = app();
    register(&app, "ada").await;
    let error = rejected(
        &app,
        accounts::REGISTER,
        record! { "username" => "ada", "password" => "other" },
    )
    .await;
    assert_eq!(error, "Username already exists.");
}

#[tokio::test]
async fn user_lookup_answers_found_and_missing() {
    let app = app();
    let user = register(&app, "ada").await;

    let found = ok(&app, reads::GET_USER_BY_USERNAME, record! { "username" => "ada" }).await;
    assert_eq!(found, record! { "user" => user.as_str(), "username" => "ada" });

    let missing = rejected(&app, reads::GET_USER_BY_USERNAME, record! { "username" => "zed" }).await;
    assert_eq!(missing, "User not found.");
}

#[tokio::test]
async fn user_listing_is_ordered_by_username() {
    let app = app();
    let empty = ok(&app, reads::GET_ALL_USERS, record! {}).await;
    assert!(column(&empty, "users", "username").is_empty());

    register(&app, "cy").await;
    register(&app, "ada").await;
    let users = ok(&app, reads::GET_ALL_USERS, record! {}).await;
    assert_eq!(column(&users, "users", "username"), vec!["ada", "cy"]);
}
