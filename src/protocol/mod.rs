// Protocol module: wire event names, payload shapes, and room codes.

pub mod error_codes;
pub mod events;
pub mod room_codes;
pub mod types;

pub use error_codes::ErrorCode;

pub use types::{
    CoinView, GridPos, PixelPos, PlayerId, PlayerPhase, PlayerState, PlayerView, Question,
    QuestionView, RoomCode, RoomPhase, RoomStatus, SinkholeView, SocketId, TrapView,
    ROOM_CODE_PREFIX, ROOM_CODE_RANDOM_LEN,
};

pub use events::{ClientEvent, PositionPayload, RejoinedPayload, RoomSnapshot, ServerEvent};

#[cfg(test)]
mod tests {
    use super::room_codes::{generate_room_code, is_valid_room_code};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn room_code_validation_matches_predicate(raw in "[A-Z0-9a-z]{0,10}") {
            let expected = raw.len() == 7
                && raw.starts_with("MAZ")
                && raw[3..].chars().all(|c| c.is_ascii_uppercase());
            prop_assert_eq!(is_valid_room_code(&raw), expected);
        }

        #[test]
        fn generated_codes_always_validate(_seed in any::<u8>()) {
            prop_assert!(is_valid_room_code(&generate_room_code()));
        }
    }
}
