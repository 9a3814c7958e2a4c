mod builtin;
mod connectivity;
mod determinism;
mod interference;
mod registry;
