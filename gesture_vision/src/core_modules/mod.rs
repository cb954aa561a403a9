pub mod background_model;
pub mod finger_counter;
pub mod gesture;
pub mod gesture_vote;
pub mod hand_state;
pub mod overlay;
pub mod region;
pub mod segmenter;
