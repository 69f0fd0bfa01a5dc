// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod achievements;
pub mod ai_client;
pub mod classifier;
pub mod groups;
pub mod hotspots;
pub mod lifecycle;
pub mod messaging;
pub mod templates;

pub use ai_client::{AiServiceClient, AiServiceError};
pub use classifier::{Classification, Classifier, ClassifierError, MockClassifier, RemoteClassifier};
pub use groups::GroupService;
pub use hotspots::{HotspotPredictor, MockHotspotPredictor, OverlayCache, RemoteHotspotPredictor};
pub use messaging::{HttpMessenger, LogMessenger, Messenger, MessagingError};
