pub mod domain;
pub mod ledger;
pub mod ports;
pub mod referral;
pub mod rotation;
pub mod session;
pub mod verification;

pub use domain::{
    AdminRecord, ApiCredential, BatchSize, Button, ButtonAction, ButtonPress, ChatId,
    InboundEvent, InboundMessage, MessageId, MessageRef, QuotaPolicy, ReferralEvent, SessionPhase,
    UserAccount, UserId, UserSession, VerificationPrompt,
};
pub use ports::{ChatTransport, ParaphraseService, PortError, PortResult, StorageService};
pub use rotation::{RotationSnapshot, RotationWindow};
