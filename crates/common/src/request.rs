//! Coordination requests and per-modality payloads.

use serde::{Deserialize, Serialize};

use crate::feature::DiagnosisType;

/// What a looking image depicts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    #[default]
    Tongue,
    Face,
    Body,
}

impl ImageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Tongue => "tongue",
            ImageType::Face => "face",
            ImageType::Body => "body",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookPayload {
    pub image: Vec<u8>,
    #[serde(default)]
    pub image_type: ImageType,
    #[serde(default = "default_image_format")]
    pub image_format: String,
}

impl LookPayload {
    pub fn new(image: impl Into<Vec<u8>>, image_type: ImageType) -> Self {
        Self {
            image: image.into(),
            image_type,
            image_format: default_image_format(),
        }
    }
}

fn default_image_format() -> String {
    "jpg".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenPayload {
    pub audio: Vec<u8>,
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_bit_depth")]
    pub bit_depth: u16,
    #[serde(default = "default_channels")]
    pub channels: u16,
}

impl ListenPayload {
    pub fn new(audio: impl Into<Vec<u8>>) -> Self {
        Self {
            audio: audio.into(),
            audio_format: default_audio_format(),
            sample_rate: default_sample_rate(),
            bit_depth: default_bit_depth(),
            channels: default_channels(),
        }
    }
}

fn default_audio_format() -> String {
    "wav".into()
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_bit_depth() -> u16 {
    16
}

fn default_channels() -> u16 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InquiryPayload {
    pub message: String,
}

impl InquiryPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PalpationPayload {
    pub pulse_data: Vec<u8>,
    #[serde(default = "default_pulse_format")]
    pub data_format: String,
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: u32,
}

impl PalpationPayload {
    pub fn new(pulse_data: impl Into<Vec<u8>>) -> Self {
        Self {
            pulse_data: pulse_data.into(),
            data_format: default_pulse_format(),
            sampling_rate: default_sampling_rate(),
        }
    }
}

fn default_pulse_format() -> String {
    "raw".into()
}

fn default_sampling_rate() -> u32 {
    1000
}

/// A payload tagged with the modality it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modality", rename_all = "snake_case")]
pub enum ModalityPayload {
    Look(LookPayload),
    Listen(ListenPayload),
    Inquiry(InquiryPayload),
    Palpation(PalpationPayload),
}

impl ModalityPayload {
    pub fn diagnosis_type(&self) -> DiagnosisType {
        match self {
            ModalityPayload::Look(_) => DiagnosisType::Looking,
            ModalityPayload::Listen(_) => DiagnosisType::Listening,
            ModalityPayload::Inquiry(_) => DiagnosisType::Inquiry,
            ModalityPayload::Palpation(_) => DiagnosisType::Palpation,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ModalityPayload::Look(p) => p.image.is_empty(),
            ModalityPayload::Listen(p) => p.audio.is_empty(),
            ModalityPayload::Inquiry(p) => p.message.trim().is_empty(),
            ModalityPayload::Palpation(p) => p.pulse_data.is_empty(),
        }
    }
}

/// One consultation. Immutable once dispatched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinationRequest {
    pub user_id: String,
    pub session_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub looking: Option<LookPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listening: Option<ListenPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inquiry: Option<InquiryPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub palpation: Option<PalpationPayload>,

    #[serde(default)]
    pub include_looking: bool,
    #[serde(default)]
    pub include_listening: bool,
    #[serde(default)]
    pub include_inquiry: bool,
    #[serde(default)]
    pub include_palpation: bool,
}

impl CoordinationRequest {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    /// Attach a looking payload and mark the modality as included.
    pub fn with_looking(mut self, payload: LookPayload) -> Self {
        self.looking = Some(payload);
        self.include_looking = true;
        self
    }

    pub fn with_listening(mut self, payload: ListenPayload) -> Self {
        self.listening = Some(payload);
        self.include_listening = true;
        self
    }

    pub fn with_inquiry(mut self, payload: InquiryPayload) -> Self {
        self.inquiry = Some(payload);
        self.include_inquiry = true;
        self
    }

    pub fn with_palpation(mut self, payload: PalpationPayload) -> Self {
        self.palpation = Some(payload);
        self.include_palpation = true;
        self
    }

    pub fn includes(&self, modality: DiagnosisType) -> bool {
        match modality {
            DiagnosisType::Looking => self.include_looking,
            DiagnosisType::Listening => self.include_listening,
            DiagnosisType::Inquiry => self.include_inquiry,
            DiagnosisType::Palpation => self.include_palpation,
        }
    }

    pub fn payload(&self, modality: DiagnosisType) -> Option<ModalityPayload> {
        match modality {
            DiagnosisType::Looking => self.looking.clone().map(ModalityPayload::Look),
            DiagnosisType::Listening => self.listening.clone().map(ModalityPayload::Listen),
            DiagnosisType::Inquiry => self.inquiry.clone().map(ModalityPayload::Inquiry),
            DiagnosisType::Palpation => self.palpation.clone().map(ModalityPayload::Palpation),
        }
    }
}
