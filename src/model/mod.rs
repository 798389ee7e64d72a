// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Data model shared by the session, snapshot, executor and cache layers.
//!
//! Graph structure is always expressed through path-keyed records; nodes never hold references to
//! each other.

pub mod node_type;
pub mod scene;
pub mod value;

pub use node_type::{NodeStub, NodeTypeEntry};
pub use scene::{join_path, NodeRecord, SceneDiff, SceneNode, SceneSnapshot, UNKNOWN_TYPE};
pub use value::{Curve, HostValue, Scalar};
