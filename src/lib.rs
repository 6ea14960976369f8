//! Lingua · learning-session engine.
//!
//! Learners work through ordered question sets (course levels, a daily
//! challenge, comprehension drills). Answers are graded locally or by an AI
//! grader; spoken answers go through an ffmpeg + blob + speech-recognition
//! pipeline first.

pub mod assessment;
pub mod cache;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod openai;
pub mod orchestrator;
pub mod protocol;
pub mod routes;
pub mod seeds;
pub mod speech;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod util;
