use std::sync::Arc;

use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::error::{AnalysisError, Stage};
use super::probe::AssetProbe;
use super::response::{interpret_reply, MealCandidate};
use super::vision::VisionModel;
use crate::storage::StorageClient;

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];
const DEFAULT_IMAGE_TYPE: &str = "image/jpeg";

pub const SYSTEM_PROMPT: &str = r#"You are a professional nutritionist. Analyze the meal in the image and reply with a single JSON object only.
The object must contain exactly these fields:
- name: name of the meal (text)
- calories: total calories (number)
- protein: protein in grams (number)
- carbs: carbohydrates in grams (number)
- fat: fat in grams (number)
- meal_type: one of breakfast, lunch, dinner, snack
- description: a short description of the meal (text)

Example reply:
{
  "name": "Grilled chicken with rice",
  "calories": 450,
  "protein": 35,
  "carbs": 48,
  "fat": 12,
  "meal_type": "lunch",
  "description": "A balanced plate of grilled chicken and rice"
}

Return the JSON only, with no extra text and no markdown."#;

pub const USER_PROMPT: &str = "Analyze this image and give me its nutrition facts as JSON.";

pub struct ImageUpload {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Raw caller input; presence is checked by the pipeline itself.
#[derive(Default)]
pub struct AnalysisRequest {
    pub image: Option<ImageUpload>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MealAnalysis {
    pub meal: MealCandidate,
    pub image_url: String,
}

struct Received {
    user_id: Uuid,
    bytes: Bytes,
    content_type: String,
}

struct Stored {
    key: String,
}

struct Published {
    url: String,
}

struct Inferred {
    url: String,
    reply: String,
}

/// Upload → publish → infer → parse → validate, once per request, no retries.
pub struct MealAnalyzer {
    storage: Arc<dyn StorageClient>,
    probe: Arc<dyn AssetProbe>,
    vision: Arc<dyn VisionModel>,
}

impl MealAnalyzer {
    pub fn new(
        storage: Arc<dyn StorageClient>,
        probe: Arc<dyn AssetProbe>,
        vision: Arc<dyn VisionModel>,
    ) -> Self {
        Self {
            storage,
            probe,
            vision,
        }
    }

    pub async fn analyze(&self, req: AnalysisRequest) -> Result<MealAnalysis, AnalysisError> {
        self.analyze_at(req, OffsetDateTime::now_utc()).await
    }

    #[instrument(skip_all)]
    pub(crate) async fn analyze_at(
        &self,
        req: AnalysisRequest,
        now: OffsetDateTime,
    ) -> Result<MealAnalysis, AnalysisError> {
        let result = self.run(req, now).await;
        match &result {
            Ok(done) => info!(stage = %Stage::Completed, image_url = %done.image_url, "meal analyzed"),
            Err(e) if e.status().is_server_error() => {
                error!(stage = %e.stage(), error = %e, details = ?e.details(), "meal analysis failed")
            }
            Err(e) => warn!(stage = %e.stage(), error = %e, details = ?e.details(), "meal analysis rejected"),
        }
        result
    }

    async fn run(&self, req: AnalysisRequest, now: OffsetDateTime) -> Result<MealAnalysis, AnalysisError> {
        let received = receive(req)?;
        let stored = self.store(received, now).await?;
        let published = self.publish(stored).await?;
        let inferred = self.infer(published).await?;
        let meal = interpret_reply(&inferred.reply).map_err(|e| {
            debug!(reply = %inferred.reply, "unusable model reply");
            AnalysisError::from(e)
        })?;
        Ok(MealAnalysis {
            meal,
            image_url: inferred.url,
        })
    }

    async fn store(&self, r: Received, now: OffsetDateTime) -> Result<Stored, AnalysisError> {
        let ext = ext_from_mime(&r.content_type).unwrap_or("jpg");
        let key = image_key(r.user_id, now, ext);
        self.storage
            .put_object(&key, r.bytes, &r.content_type)
            .await
            .map_err(|e| AnalysisError::StorageWrite(format!("{e:#}")))?;
        debug!(stage = %Stage::Stored, %key, "image stored");
        Ok(Stored { key })
    }

    async fn publish(&self, s: Stored) -> Result<Published, AnalysisError> {
        let url = self
            .storage
            .public_url(&s.key)
            .ok_or(AnalysisError::UnpublishedAsset)?;
        self.probe
            .check(&url)
            .await
            .map_err(|e| AnalysisError::UnreachableAsset(e.to_string()))?;
        debug!(stage = %Stage::Published, %url, "image published");
        Ok(Published { url })
    }

    async fn infer(&self, p: Published) -> Result<Inferred, AnalysisError> {
        let reply = self.vision.complete(SYSTEM_PROMPT, &p.url, USER_PROMPT).await?;
        debug!(stage = %Stage::Inferred, reply_len = reply.len(), "model replied");
        Ok(Inferred { url: p.url, reply })
    }
}

fn receive(req: AnalysisRequest) -> Result<Received, AnalysisError> {
    let image = req
        .image
        .filter(|i| !i.bytes.is_empty())
        .ok_or(AnalysisError::MissingImage)?;
    let raw_user = req
        .user_id
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or(AnalysisError::MissingUser)?;
    let user_id = Uuid::parse_str(&raw_user)
        .map_err(|_| AnalysisError::InvalidUser(format!("not a UUID: {raw_user}")))?;

    let content_type = image
        .content_type
        .as_deref()
        .map(normalize_mime)
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| DEFAULT_IMAGE_TYPE.to_string());
    if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
        return Err(AnalysisError::InvalidImage(format!(
            "unsupported content type {content_type}; expected one of {}",
            ALLOWED_IMAGE_TYPES.join(", ")
        )));
    }
    if image.bytes.len() > MAX_IMAGE_BYTES {
        return Err(AnalysisError::InvalidImage(format!(
            "image is {} bytes; limit is {MAX_IMAGE_BYTES}",
            image.bytes.len()
        )));
    }

    debug!(stage = %Stage::Received, %user_id, %content_type, size = image.bytes.len(), "image received");
    Ok(Received {
        user_id,
        bytes: image.bytes,
        content_type,
    })
}

fn normalize_mime(ct: &str) -> String {
    ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

/// `{user}/user_{user}_meal_{unix_millis}.{ext}`
pub(crate) fn image_key(user_id: Uuid, at: OffsetDateTime, ext: &str) -> String {
    let millis = at.unix_timestamp_nanos() / 1_000_000;
    format!("{user_id}/user_{user_id}_meal_{millis}.{ext}")
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::probe::ProbeError;
    use crate::analysis::response::{MealType, ValidationError};
    use crate::analysis::vision::VisionError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::macros::datetime;

    const USER: &str = "7f1c2a9e-3b4d-4e5f-8a6b-0c1d2e3f4a5b";

    #[derive(Default)]
    struct FakeStorage {
        fail_put: bool,
        unpublished: bool,
        puts: Mutex<Vec<(String, usize, String)>>,
    }

    #[async_trait]
    impl StorageClient for FakeStorage {
        async fn put_object(&self, key: &str, body: Bytes, ct: &str) -> anyhow::Result<()> {
            if self.fail_put {
                anyhow::bail!("bucket is read-only");
            }
            self.puts
                .lock()
                .unwrap()
                .push((key.to_string(), body.len(), ct.to_string()));
            Ok(())
        }

        fn public_url(&self, key: &str) -> Option<String> {
            (!self.unpublished).then(|| format!("https://cdn.test/food_images/{key}"))
        }
    }

    #[derive(Default)]
    struct FakeProbe {
        down: bool,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl AssetProbe for FakeProbe {
        async fn check(&self, _url: &str) -> Result<(), ProbeError> {
            *self.calls.lock().unwrap() += 1;
            if self.down {
                Err(ProbeError::Status(403))
            } else {
                Ok(())
            }
        }
    }

    struct FakeVision {
        reply: Result<String, fn() -> VisionError>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeVision {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(f: fn() -> VisionError) -> Self {
            Self {
                reply: Err(f),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VisionModel for FakeVision {
        async fn complete(&self, system: &str, url: &str, user: &str) -> Result<String, VisionError> {
            assert_eq!(system, SYSTEM_PROMPT);
            assert_eq!(user, USER_PROMPT);
            self.calls.lock().unwrap().push(url.to_string());
            match &self.reply {
                Ok(t) => Ok(t.clone()),
                Err(f) => Err(f()),
            }
        }
    }

    const GOOD_REPLY: &str = "```json\n{\"name\":\"Oatmeal\",\"calories\":320,\"protein\":11,\"carbs\":54,\"fat\":7,\"meal_type\":\"breakfast\"}\n```";

    fn request(bytes: &'static [u8], ct: Option<&str>, user: Option<&str>) -> AnalysisRequest {
        AnalysisRequest {
            image: Some(ImageUpload {
                bytes: Bytes::from_static(bytes),
                content_type: ct.map(str::to_string),
            }),
            user_id: user.map(str::to_string),
        }
    }

    struct Harness {
        storage: Arc<FakeStorage>,
        probe: Arc<FakeProbe>,
        vision: Arc<FakeVision>,
        analyzer: MealAnalyzer,
    }

    fn harness(storage: FakeStorage, probe: FakeProbe, vision: FakeVision) -> Harness {
        let storage = Arc::new(storage);
        let probe = Arc::new(probe);
        let vision = Arc::new(vision);
        let analyzer = MealAnalyzer::new(storage.clone(), probe.clone(), vision.clone());
        Harness {
            storage,
            probe,
            vision,
            analyzer,
        }
    }

    const NOW: OffsetDateTime = datetime!(2024-03-01 12:00:00.123 UTC);

    #[tokio::test]
    async fn happy_path_returns_candidate_and_url() {
        let h = harness(
            FakeStorage::default(),
            FakeProbe::default(),
            FakeVision::replying(GOOD_REPLY),
        );
        let out = h
            .analyzer
            .analyze_at(request(b"jpegdata", Some("image/jpeg"), Some(USER)), NOW)
            .await
            .unwrap();

        let expected_key = format!("{USER}/user_{USER}_meal_1709294400123.jpg");
        assert_eq!(out.image_url, format!("https://cdn.test/food_images/{expected_key}"));
        assert_eq!(out.meal.name, "Oatmeal");
        assert_eq!(out.meal.meal_type, MealType::Breakfast);
        assert_eq!(out.meal.description, "");

        let puts = h.storage.puts.lock().unwrap();
        assert_eq!(puts.as_slice(), &[(expected_key, 8, "image/jpeg".to_string())]);
        assert_eq!(*h.probe.calls.lock().unwrap(), 1);
        assert_eq!(h.vision.calls.lock().unwrap().as_slice(), &[out.image_url.clone()]);
    }

    #[tokio::test]
    async fn missing_inputs_fail_before_any_side_effect() {
        let h = harness(
            FakeStorage::default(),
            FakeProbe::default(),
            FakeVision::replying(GOOD_REPLY),
        );

        let err = h
            .analyzer
            .analyze_at(AnalysisRequest { image: None, user_id: Some(USER.into()) }, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingImage));

        let err = h.analyzer.analyze_at(request(b"", None, Some(USER)), NOW).await.unwrap_err();
        assert!(matches!(err, AnalysisError::MissingImage));

        let err = h.analyzer.analyze_at(request(b"x", None, None), NOW).await.unwrap_err();
        assert!(matches!(err, AnalysisError::MissingUser));

        let err = h.analyzer.analyze_at(request(b"x", None, Some("  ")), NOW).await.unwrap_err();
        assert!(matches!(err, AnalysisError::MissingUser));

        let err = h
            .analyzer
            .analyze_at(request(b"x", None, Some("../etc")), NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidUser(_)));

        assert!(h.storage.puts.lock().unwrap().is_empty());
        assert!(h.vision.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn content_type_is_checked_and_defaulted() {
        let h = harness(
            FakeStorage::default(),
            FakeProbe::default(),
            FakeVision::replying(GOOD_REPLY),
        );

        let err = h
            .analyzer
            .analyze_at(request(b"gif", Some("image/gif"), Some(USER)), NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidImage(_)));

        h.analyzer
            .analyze_at(request(b"png", Some("Image/PNG; q=1"), Some(USER)), NOW)
            .await
            .unwrap();
        h.analyzer.analyze_at(request(b"raw", None, Some(USER)), NOW).await.unwrap();

        let puts = h.storage.puts.lock().unwrap();
        assert!(puts[0].0.ends_with(".png"));
        assert_eq!(puts[0].2, "image/png");
        assert!(puts[1].0.ends_with(".jpg"));
        assert_eq!(puts[1].2, "image/jpeg");
    }

    #[tokio::test]
    async fn storage_failure_stops_the_pipeline() {
        let h = harness(
            FakeStorage { fail_put: true, ..Default::default() },
            FakeProbe::default(),
            FakeVision::replying(GOOD_REPLY),
        );
        let err = h.analyzer.analyze_at(request(b"x", None, Some(USER)), NOW).await.unwrap_err();
        assert!(matches!(err, AnalysisError::StorageWrite(ref d) if d.contains("read-only")));
        assert_eq!(*h.probe.calls.lock().unwrap(), 0);
        assert!(h.vision.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unpublished_and_unreachable_assets_fail() {
        let h = harness(
            FakeStorage { unpublished: true, ..Default::default() },
            FakeProbe::default(),
            FakeVision::replying(GOOD_REPLY),
        );
        let err = h.analyzer.analyze_at(request(b"x", None, Some(USER)), NOW).await.unwrap_err();
        assert!(matches!(err, AnalysisError::UnpublishedAsset));
        assert_eq!(*h.probe.calls.lock().unwrap(), 0);

        let h = harness(
            FakeStorage::default(),
            FakeProbe { down: true, ..Default::default() },
            FakeVision::replying(GOOD_REPLY),
        );
        let err = h.analyzer.analyze_at(request(b"x", None, Some(USER)), NOW).await.unwrap_err();
        assert!(matches!(err, AnalysisError::UnreachableAsset(_)));
        assert_eq!(err.stage(), Stage::Published);
        assert!(h.vision.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn inference_failures_are_typed() {
        let h = harness(
            FakeStorage::default(),
            FakeProbe::default(),
            FakeVision::failing(|| VisionError::NotConfigured),
        );
        let err = h.analyzer.analyze_at(request(b"x", None, Some(USER)), NOW).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InferenceConfig));

        let h = harness(
            FakeStorage::default(),
            FakeProbe::default(),
            FakeVision::failing(|| VisionError::Status { status: 500, message: "boom".into() }),
        );
        let err = h.analyzer.analyze_at(request(b"x", None, Some(USER)), NOW).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InferenceUnavailable(_)));
        assert_eq!(h.vision.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bad_replies_fail_at_parse_or_validate() {
        let h = harness(
            FakeStorage::default(),
            FakeProbe::default(),
            FakeVision::replying("Sorry, I can't help with that."),
        );
        let err = h.analyzer.analyze_at(request(b"x", None, Some(USER)), NOW).await.unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));

        let h = harness(
            FakeStorage::default(),
            FakeProbe::default(),
            FakeVision::replying(
                r#"{"name":"Soup","calories":120,"protein":4,"carbs":-2,"fat":3,"meal_type":"dinner"}"#,
            ),
        );
        let err = h.analyzer.analyze_at(request(b"x", None, Some(USER)), NOW).await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InvalidMealData(ValidationError::NotNonNegativeNumber("carbs"))
        ));
        assert_eq!(err.field(), Some("carbs"));
    }

    #[test]
    fn image_key_is_namespaced_by_user_and_millis() {
        let user = Uuid::parse_str(USER).unwrap();
        let a = image_key(user, NOW, "png");
        let b = image_key(user, NOW + time::Duration::milliseconds(1), "png");
        assert!(a.starts_with(&format!("{USER}/user_{USER}_meal_")));
        assert_ne!(a, b);
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }
}
