// Composition root for the aggregate store.
//
// Responsibilities
// - Read config from the environment.
// - Instantiate concrete infrastructure implementations (see main.rs for the replay tool).

pub mod settings;
