// Aggregates per-module test suites
mod _support;
mod template;
