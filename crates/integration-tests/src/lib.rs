//! End-to-end scenarios for the vaultnet protocol.
//!
//! Every test wires a complete in-process network (custodian, registry,
//! transport, watcher fleet) through `node-runtime` and drives it with the
//! client, controlling the challenge window through a manual clock.

#[cfg(test)]
mod scenarios;
