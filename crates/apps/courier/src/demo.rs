//! Offline demo backend
//!
//! An in-memory server with a couple of partners so the client can be tried
//! without a running message store.

use chat::{InMemoryChatServer, hash_password};
use chrono::{Duration, Utc};
use log::info;
use std::sync::Arc;
use std::thread;

const ECHO: &str = "echo";
const NEWCOMER: &str = "newcomer";

/// Build a server that accepts `user` / `password` and already has some history
pub fn demo_server(user: &str, password: &str) -> Arc<InMemoryChatServer> {
    let server = Arc::new(InMemoryChatServer::new());
    server.register_account(user, hash_password(password));
    server.register_account(ECHO, hash_password(password));
    server.register_account(NEWCOMER, hash_password(password));
    server.set_pending_ready_checks(2);

    server.seed_chat(user, ECHO);
    let now = Utc::now();
    server.deliver(ECHO, user, "Welcome to the offline demo.", now - Duration::days(1));
    server.deliver(ECHO, user, "Type /open echo to read this thread.", now - Duration::minutes(5));
    server
}

/// Have a new partner start a conversation after `delay`
pub fn schedule_newcomer(server: Arc<InMemoryChatServer>, user: String, delay: std::time::Duration) {
    thread::spawn(move || {
        thread::sleep(delay);
        info!("Demo: {} is writing to {}", NEWCOMER, user);
        server.deliver(NEWCOMER, user.as_str(), "Hi! Found you through the directory.", Utc::now());
    });
}
