pub mod ancestor;
pub mod cell_map;
pub mod creature;
pub mod execution;
pub mod genotype;
pub mod instruction;
pub mod inventory;
pub mod reaper;
pub mod rng;
pub mod settings;
pub mod soup;
pub mod timeslicer;
pub mod world;
