//! Woodtick engine: a cooperative script-thread scheduler, continuation
//! queue and verb-sentence pipeline driven by embedded Lua.

pub mod audio_bridge;
pub mod cli;
pub mod handles;
pub mod lua_host;
pub mod runtime;
pub mod scheduler;
pub mod sentence;
pub mod verbs;
pub mod world;
