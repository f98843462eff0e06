//! Portal login.
//!
//! Login is a fixed six-step handshake. Each `LoginStage` declares whether its
//! failure is fatal; the two warm-up stages only mirror what the portal's own
//! browser flow does and may fail without stopping the sequence.

use percent_encoding::percent_decode_str;
use serde_json::{Value, json};

use crate::{
    config::{LoginCredentials, PortalConfig},
    error::AuthError,
    http::{HttpClient, PortalRequest, PortalResponse},
    types::Credential,
};

/// Cookie set by the authenticate endpoint, holding URL-encoded `{"token": "..."}`.
pub const AUTH_COOKIE: &str = "auth-token";

/// Source of the one-time code the operator received out of band.
pub trait CodePrompt {
    fn read_code(&self) -> std::io::Result<String>;
}

impl<F> CodePrompt for F
where
    F: Fn() -> std::io::Result<String>,
{
    fn read_code(&self) -> std::io::Result<String> {
        self()
    }
}

/// Hooks for showing login progress. Both methods default to doing nothing.
pub trait LoginObserver {
    fn stage_started(&mut self, _stage: LoginStage) {}
    fn stage_skipped(&mut self, _stage: LoginStage, _reason: &str) {}
}

impl LoginObserver for () {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    SubmitPassword,
    RequestCode,
    ValidateCode,
    RegisterPageAccess,
    OpenLanding,
    Authenticate,
}

impl LoginStage {
    pub const SEQUENCE: [LoginStage; 6] = [
        LoginStage::SubmitPassword,
        LoginStage::RequestCode,
        LoginStage::ValidateCode,
        LoginStage::RegisterPageAccess,
        LoginStage::OpenLanding,
        LoginStage::Authenticate,
    ];

    pub fn step(self) -> usize {
        match self {
            LoginStage::SubmitPassword => 1,
            LoginStage::RequestCode => 2,
            LoginStage::ValidateCode => 3,
            LoginStage::RegisterPageAccess => 4,
            LoginStage::OpenLanding => 5,
            LoginStage::Authenticate => 6,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            LoginStage::SubmitPassword => "Submitting username and password",
            LoginStage::RequestCode => "Requesting one-time code",
            LoginStage::ValidateCode => "Validating one-time code",
            LoginStage::RegisterPageAccess => "Registering page access",
            LoginStage::OpenLanding => "Opening Event Management",
            LoginStage::Authenticate => "Authenticating with Event Management",
        }
    }

    pub fn is_best_effort(self) -> bool {
        self.failure(String::new()).is_none()
    }

    /// The error a failure at this stage aborts login with, or `None` when the
    /// stage is best-effort.
    fn failure(self, reason: String) -> Option<AuthError> {
        match self {
            LoginStage::SubmitPassword => Some(AuthError::PasswordRejected { reason }),
            LoginStage::RequestCode => Some(AuthError::CodeRequestFailed { reason }),
            LoginStage::ValidateCode => Some(AuthError::CodeInvalid { reason }),
            LoginStage::RegisterPageAccess | LoginStage::OpenLanding => None,
            LoginStage::Authenticate => Some(AuthError::TokenExtractionFailed { reason }),
        }
    }
}

/// Decode the `auth-token` cookie value into a credential.
pub fn parse_auth_cookie(raw: &str) -> Result<Credential, String> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|e| format!("cookie is not valid UTF-8 once decoded: {e}"))?;
    let payload: Value = serde_json::from_str(&decoded)
        .map_err(|e| format!("cookie does not hold JSON: {e}"))?;
    match payload.get("token").and_then(Value::as_str) {
        Some(token) if !token.is_empty() => Ok(Credential::new(token)),
        _ => Err("cookie JSON has no token field".to_string()),
    }
}

/// The portal session: one cookie jar plus, once logged in, the bearer credential.
pub struct Session<C> {
    client: C,
    portal: PortalConfig,
    credential: Option<Credential>,
}

impl<C: HttpClient> Session<C> {
    pub fn new(client: C, portal: PortalConfig) -> Self {
        Self {
            client,
            portal,
            credential: None,
        }
    }

    /// A session around a token obtained out of band. No login steps run.
    pub fn with_credential(client: C, portal: PortalConfig, credential: Credential) -> Self {
        Self {
            client,
            portal,
            credential: Some(credential),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn portal(&self) -> &PortalConfig {
        &self.portal
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    /// Run the login sequence, blocking on `prompt` for the one-time code.
    pub async fn login(
        &mut self,
        account: &LoginCredentials,
        prompt: &dyn CodePrompt,
        observer: &mut dyn LoginObserver,
    ) -> Result<&Credential, AuthError> {
        for stage in LoginStage::SEQUENCE {
            observer.stage_started(stage);
            tracing::info!(step = stage.step(), "{}", stage.description());

            match self.run_stage(stage, account, prompt).await {
                Ok(Some(credential)) => {
                    tracing::info!(token = %credential.preview(), "Bearer token extracted");
                    self.credential = Some(credential);
                }
                Ok(None) => {}
                Err(reason) => match stage.failure(reason.clone()) {
                    Some(err) => {
                        tracing::error!(step = stage.step(), %reason, "Login step failed");
                        return Err(err);
                    }
                    None => {
                        tracing::warn!(step = stage.step(), %reason, "Login step failed, continuing");
                        observer.stage_skipped(stage, &reason);
                    }
                },
            }
        }

        self.credential
            .as_ref()
            .ok_or_else(|| AuthError::TokenExtractionFailed {
                reason: "login finished without a token".to_string(),
            })
    }

    async fn run_stage(
        &self,
        stage: LoginStage,
        account: &LoginCredentials,
        prompt: &dyn CodePrompt,
    ) -> Result<Option<Credential>, String> {
        match stage {
            LoginStage::SubmitPassword => self.submit_password(account).await.map(|_| None),
            LoginStage::RequestCode => self.request_code(account).await.map(|_| None),
            LoginStage::ValidateCode => self.validate_code(account, prompt).await.map(|_| None),
            LoginStage::RegisterPageAccess => self.register_page_access().await.map(|_| None),
            LoginStage::OpenLanding => self.open_landing().await.map(|_| None),
            LoginStage::Authenticate => self.authenticate().await.map(Some),
        }
    }

    /// Send and require a 2xx status. Failures are flattened to a reason string.
    async fn send(&self, request: PortalRequest) -> Result<PortalResponse, String> {
        let response = self
            .client
            .execute(&request)
            .await
            .map_err(|e| e.to_string())?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(format!("HTTP {} from {}", response.status, request.url))
        }
    }

    fn login_form_request(&self, url: String, body: Value) -> PortalRequest {
        PortalRequest::post_json(url, body)
            .origin(self.portal.login_url.trim_end_matches('/'))
            .referer(format!("{}/login", self.portal.login_url.trim_end_matches('/')))
    }

    async fn submit_password(&self, account: &LoginCredentials) -> Result<PortalResponse, String> {
        let body = json!({
            "username": account.username,
            "password": account.password,
            "language": "en",
        });
        self.send(self.login_form_request(self.portal.login_endpoint(), body))
            .await
    }

    async fn request_code(&self, account: &LoginCredentials) -> Result<PortalResponse, String> {
        let body = json!({ "type": "SMS_OTP", "credid": account.mfa_credential_id });
        self.send(self.login_form_request(self.portal.send_code_endpoint(), body))
            .await
    }

    async fn validate_code(
        &self,
        account: &LoginCredentials,
        prompt: &dyn CodePrompt,
    ) -> Result<PortalResponse, String> {
        let code = prompt
            .read_code()
            .map_err(|e| format!("could not read code: {e}"))?;
        let code = code.trim();
        if code.is_empty() {
            return Err("no code entered".to_string());
        }

        let body = json!({
            "type": "SMS_OTP",
            "credid": account.mfa_credential_id,
            "code": code,
            "failureCount": 0,
        });
        self.send(self.login_form_request(self.portal.validate_code_endpoint(), body))
            .await
    }

    async fn register_page_access(&self) -> Result<PortalResponse, String> {
        let request = PortalRequest::get(self.portal.page_access_endpoint())
            .query("pageId", "6")
            .query("pageSubId", "w6040")
            .query("pageSubDesc", "Event Management System")
            .referer(self.portal.portal_landing());
        self.send(request).await
    }

    async fn open_landing(&self) -> Result<PortalResponse, String> {
        self.send(PortalRequest::get(self.portal.portal_landing()).navigation())
            .await?;
        self.send(PortalRequest::get(self.portal.event_management_landing()).navigation())
            .await
    }

    async fn authenticate(&self) -> Result<Credential, String> {
        let request = PortalRequest::get(self.portal.authenticate_endpoint())
            .referer(self.portal.event_management_landing());
        self.send(request).await?;

        let raw = self
            .client
            .cookie(&self.portal.authenticate_endpoint(), AUTH_COOKIE)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| format!("{AUTH_COOKIE} cookie not set"))?;
        parse_auth_cookie(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::HttpError, http::MockHttpClient};

    const TOKEN_COOKIE: &str = "%7B%22token%22%3A%22abc.def.ghi%22%7D";

    fn portal() -> PortalConfig {
        PortalConfig {
            login_url: "https://login.test".to_string(),
            portal_url: "https://portal.test".to_string(),
            event_management_url: "https://portal.test/EventManagement".to_string(),
            ..PortalConfig::default()
        }
    }

    fn account() -> LoginCredentials {
        LoginCredentials {
            username: "user".to_string(),
            password: "pass".to_string(),
            mfa_credential_id: "cred-1".to_string(),
        }
    }

    fn code() -> std::io::Result<String> {
        Ok(" 123456\n".to_string())
    }

    fn happy_path(mock: &MockHttpClient) {
        mock.add_response("POST /api/login", Ok(PortalResponse::ok("")));
        mock.add_response("POST /api/mfa/sendCode", Ok(PortalResponse::ok("")));
        mock.add_response("POST /api/mfa/validateCode", Ok(PortalResponse::ok("")));
        mock.add_response(
            "GET /rl_portal_services/api/Site/InsertRlPageDetails",
            Ok(PortalResponse::ok("")),
        );
        mock.add_response("GET /rl_portal/", Ok(PortalResponse::ok("<html/>")));
        mock.add_response("GET /EventManagement/", Ok(PortalResponse::ok("<html/>")));
        mock.add_response_with_cookies(
            "GET /EventManagement/api/authenticate",
            Ok(PortalResponse::ok("{}")),
            &[(AUTH_COOKIE, TOKEN_COOKIE)],
        );
    }

    #[test]
    fn fatal_and_best_effort_stages() {
        let best_effort: Vec<_> = LoginStage::SEQUENCE
            .into_iter()
            .filter(|s| s.is_best_effort())
            .collect();
        assert_eq!(
            best_effort,
            vec![LoginStage::RegisterPageAccess, LoginStage::OpenLanding]
        );
        let steps: Vec<_> = LoginStage::SEQUENCE.iter().map(|s| s.step()).collect();
        assert_eq!(steps, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn auth_cookie_parsing() {
        assert_eq!(
            parse_auth_cookie(TOKEN_COOKIE).unwrap().bearer(),
            "abc.def.ghi"
        );
        assert!(parse_auth_cookie("not-json").is_err());
        assert!(parse_auth_cookie("%7B%22other%22%3A1%7D").is_err());
        assert!(parse_auth_cookie("%7B%22token%22%3A%22%22%7D").is_err());
    }

    #[tokio::test]
    async fn full_login_yields_credential() {
        let mock = MockHttpClient::new();
        happy_path(&mock);

        let mut session = Session::new(mock.clone(), portal());
        let credential = session.login(&account(), &code, &mut ()).await.unwrap();
        assert_eq!(credential.bearer(), "abc.def.ghi");
        assert!(session.is_authenticated());

        assert_eq!(
            mock.called_paths(),
            vec![
                "POST /api/login",
                "POST /api/mfa/sendCode",
                "POST /api/mfa/validateCode",
                "GET /rl_portal_services/api/Site/InsertRlPageDetails",
                "GET /rl_portal/",
                "GET /EventManagement/",
                "GET /EventManagement/api/authenticate",
            ]
        );

        let validate = &mock.get_calls()[2];
        let body = validate.json.as_ref().unwrap();
        assert_eq!(body["code"], "123456");
        assert_eq!(body["credid"], "cred-1");
    }

    #[tokio::test]
    async fn rejected_password_stops_immediately() {
        let mock = MockHttpClient::new();
        mock.add_response("POST /api/login", Ok(PortalResponse::with_status(401)));

        let mut session = Session::new(mock.clone(), portal());
        let err = session.login(&account(), &code, &mut ()).await.unwrap_err();
        assert!(matches!(err, AuthError::PasswordRejected { .. }));
        assert_eq!(mock.call_count(), 1);
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn code_request_failure_is_fatal() {
        let mock = MockHttpClient::new();
        mock.add_response("POST /api/login", Ok(PortalResponse::ok("")));
        mock.add_response(
            "POST /api/mfa/sendCode",
            Err(HttpError::Other("connection reset".to_string())),
        );

        let mut session = Session::new(mock, portal());
        let err = session.login(&account(), &code, &mut ()).await.unwrap_err();
        assert!(matches!(err, AuthError::CodeRequestFailed { .. }));
    }

    #[tokio::test]
    async fn wrong_code_is_not_retried() {
        let mock = MockHttpClient::new();
        mock.add_response("POST /api/login", Ok(PortalResponse::ok("")));
        mock.add_response("POST /api/mfa/sendCode", Ok(PortalResponse::ok("")));
        mock.add_response(
            "POST /api/mfa/validateCode",
            Ok(PortalResponse::with_status(400)),
        );

        let mut session = Session::new(mock.clone(), portal());
        let err = session.login(&account(), &code, &mut ()).await.unwrap_err();
        assert!(matches!(err, AuthError::CodeInvalid { .. }));
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn blank_code_is_invalid_without_a_request() {
        let mock = MockHttpClient::new();
        mock.add_response("POST /api/login", Ok(PortalResponse::ok("")));
        mock.add_response("POST /api/mfa/sendCode", Ok(PortalResponse::ok("")));

        let blank = || Ok("   \n".to_string());
        let mut session = Session::new(mock.clone(), portal());
        let err = session.login(&account(), &blank, &mut ()).await.unwrap_err();
        assert!(matches!(err, AuthError::CodeInvalid { .. }));
        assert_eq!(mock.call_count(), 2);
    }

    #[derive(Default)]
    struct Recorder {
        started: Vec<LoginStage>,
        skipped: Vec<LoginStage>,
    }

    impl LoginObserver for Recorder {
        fn stage_started(&mut self, stage: LoginStage) {
            self.started.push(stage);
        }
        fn stage_skipped(&mut self, stage: LoginStage, _reason: &str) {
            self.skipped.push(stage);
        }
    }

    #[tokio::test]
    async fn warm_up_failures_are_skipped() {
        let mock = MockHttpClient::new();
        mock.add_response("POST /api/login", Ok(PortalResponse::ok("")));
        mock.add_response("POST /api/mfa/sendCode", Ok(PortalResponse::ok("")));
        mock.add_response("POST /api/mfa/validateCode", Ok(PortalResponse::ok("")));
        mock.add_response(
            "GET /rl_portal_services/api/Site/InsertRlPageDetails",
            Ok(PortalResponse::with_status(500)),
        );
        mock.add_response("GET /rl_portal/", Ok(PortalResponse::with_status(503)));
        mock.add_response_with_cookies(
            "GET /EventManagement/api/authenticate",
            Ok(PortalResponse::ok("{}")),
            &[(AUTH_COOKIE, TOKEN_COOKIE)],
        );

        let mut recorder = Recorder::default();
        let mut session = Session::new(mock, portal());
        session
            .login(&account(), &code, &mut recorder)
            .await
            .unwrap();

        assert_eq!(recorder.started, LoginStage::SEQUENCE.to_vec());
        assert_eq!(
            recorder.skipped,
            vec![LoginStage::RegisterPageAccess, LoginStage::OpenLanding]
        );
    }

    #[tokio::test]
    async fn missing_cookie_fails_token_extraction() {
        let mock = MockHttpClient::new();
        mock.add_response("POST /api/login", Ok(PortalResponse::ok("")));
        mock.add_response("POST /api/mfa/sendCode", Ok(PortalResponse::ok("")));
        mock.add_response("POST /api/mfa/validateCode", Ok(PortalResponse::ok("")));
        mock.add_response(
            "GET /EventManagement/api/authenticate",
            Ok(PortalResponse::ok("{}")),
        );

        let mut session = Session::new(mock, portal());
        let err = session.login(&account(), &code, &mut ()).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExtractionFailed { .. }));
    }

    #[tokio::test]
    async fn garbled_cookie_fails_token_extraction() {
        let mock = MockHttpClient::new();
        mock.add_response("POST /api/login", Ok(PortalResponse::ok("")));
        mock.add_response("POST /api/mfa/sendCode", Ok(PortalResponse::ok("")));
        mock.add_response("POST /api/mfa/validateCode", Ok(PortalResponse::ok("")));
        mock.add_response_with_cookies(
            "GET /EventManagement/api/authenticate",
            Ok(PortalResponse::ok("{}")),
            &[(AUTH_COOKIE, "%7Bbroken")],
        );

        let mut session = Session::new(mock, portal());
        let err = session.login(&account(), &code, &mut ()).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExtractionFailed { .. }));
    }

    #[test]
    fn supplied_credential_skips_login() {
        let session = Session::with_credential(
            MockHttpClient::new(),
            portal(),
            Credential::new("pre-obtained"),
        );
        assert!(session.is_authenticated());
        assert_eq!(session.client().call_count(), 0);
    }
}
