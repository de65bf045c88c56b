//! CLI argument definitions.
//!
//! Commands:
//! - mirrorsync serve          run forever, ticking `RunOnce` on an interval
//! - mirrorsync run-once       one incremental pass, then exit
//! - mirrorsync force-full     one full re-replication pass, then exit
//! - mirrorsync force-auth     one auth-only full pass, then exit
//! - mirrorsync recover        standby -> primary recovery, then exit
//! - mirrorsync reconcile      compare both sides without mutating, then exit
//! - mirrorsync stats          print the current stats snapshot, then exit
//! - mirrorsync reset-stats    zero the counters, then exit

use clap::{Parser, Subcommand};

/// mirrorsync - active/standby document-store and auth-directory replicator
#[derive(Parser, Debug)]
#[command(name = "mirrorsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP control surface, the Health Monitor probe loop, and the
    /// fixed-interval run scheduler. Runs until killed.
    Serve,

    /// Trigger one incremental replication pass.
    RunOnce,

    /// Reset all forward watermarks and trigger a full re-replication pass.
    ForceFull,

    /// Trigger an auth-only full replication pass.
    ForceAuth,

    /// Trigger standby -> primary recovery, then reconcile.
    Recover,

    /// Compare both sides' document and user sets without mutating either.
    Reconcile,

    /// Print the current stats snapshot.
    Stats,

    /// Zero the run counters (watermarks are left untouched).
    ResetStats,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
