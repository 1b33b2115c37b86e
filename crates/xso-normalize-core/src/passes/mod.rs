//! Rewrite pass modules.
//!
//! Each pass mutates the definitions graph in place and assumes the output of
//! the previous passes. They run in numeric order; pass 4 re-enters the
//! `allOf` squash of pass 5 when it rewrote anything.

pub mod p1_poly_hierarchy;
pub mod p2_nil_split;
pub mod p3_type_of;
pub mod p4_restriction;
pub mod p5_simplify;
pub mod p6_defaults;
pub mod p7_prune;
pub mod p8_cleanup;
pub mod p9_canonical;
pub mod pass_result;
pub(crate) mod pass_utils;
