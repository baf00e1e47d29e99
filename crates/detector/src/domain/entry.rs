#![forbid(unsafe_code)]

use crate::signature::SignatureDefect;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A process flagged by the unsigned or malicious signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub exe_path: PathBuf,
}

/// A process whose executable is signed, but whose signature the platform
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectiveEntry {
    pub pid: u32,
    pub name: String,
    pub exe_path: PathBuf,
    pub defect: SignatureDefect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipEntry {
    pub parent_pid: u32,
    pub parent_name: String,
    pub child_pid: u32,
    pub child_name: String,
}
