// SPDX-License-Identifier: MIT

/// Per-invocation settings, passed down to every probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Print the decoded table of each device.
    pub summary: bool,
    /// Decode and report, but make no kernel calls.
    pub dry_run: bool,
    /// Continue with the remaining devices after one fails.
    pub keep_going: bool,
}
