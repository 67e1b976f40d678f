// ─────────────────────────────────────────────────────────────────────
// VMEC Parity — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Interchange version written by this build. Bump on any schema change.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Default relative tolerance for initial-guess vs converged axis checks.
pub const DEFAULT_AXIS_TOLERANCE: f64 = 1e-6;

/// Residual level below which a reference run counts as converged
/// when neither the comparator config nor the subject input provide one.
pub const DEFAULT_CONVERGENCE_THRESHOLD: f64 = 1e-10;

/// Prefix marking a container member as a global attribute.
pub const ATTRIBUTE_PREFIX: char = '@';

/// Finding asserted when the subject hits a bad Jacobian the reference survived.
pub const RECOVERY_FINDING: &str =
    "reference solver recovers via axis-guess refinement; subject solver does not";
