//! Test assertion helpers for server envelope streams
#![allow(dead_code)] // Test utilities may not all be used in every test

use opschat_signaling::websockets::ServerMessage;

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Extracts (room_id, user_id, is_typing) from every typing envelope
pub fn typing_events(messages: &[ServerMessage]) -> Vec<(String, String, bool)> {
    messages
        .iter()
        .filter_map(|message| match message {
            ServerMessage::Typing {
                room_id,
                user_id,
                is_typing,
            } => Some((room_id.clone(), user_id.clone(), *is_typing)),
            _ => None,
        })
        .collect()
}

/// Extracts (user_id, online) from every presence envelope
pub fn presence_events(messages: &[ServerMessage]) -> Vec<(String, bool)> {
    messages
        .iter()
        .filter_map(|message| match message {
            ServerMessage::UserOnline { user_id } => Some((user_id.clone(), true)),
            ServerMessage::UserOffline { user_id } => Some((user_id.clone(), false)),
            _ => None,
        })
        .collect()
}

/// Asserts exactly one error envelope whose text contains `needle`
pub fn assert_single_error(messages: &[ServerMessage], needle: &str) {
    let errors: Vec<&String> = messages
        .iter()
        .filter_map(|message| match message {
            ServerMessage::Error { error } => Some(error),
            _ => None,
        })
        .collect();

    assert_eq!(
        errors.len(),
        1,
        "expected exactly one error envelope, got {:?}",
        errors
    );
    assert!(
        errors[0].contains(needle),
        "error {:?} does not mention {:?}",
        errors[0],
        needle
    );
}

/// Asserts that no typing envelope in the stream is attributed to `user_id`
pub fn assert_no_typing_from(messages: &[ServerMessage], user_id: &str) {
    assert!(
        typing_events(messages)
            .iter()
            .all(|(_, typist, _)| typist != user_id),
        "unexpected typing event attributed to {}",
        user_id
    );
}
