use anyhow::{anyhow, Context, Result};
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

struct SmtpSettings {
    server: String,
    port: u16,
    login: String,
    password: String,
    from_name: String,
    from_email: String,
    use_tls: bool,
}

/// Outbound mail for password resets. SMTP settings come from the
/// environment; with EMAIL_SEND_DISABLED=1 nothing is sent and the caller
/// returns the temporary password in the response instead (dev mode).
pub struct EmailService;

impl EmailService {
    pub fn new() -> Self {
        Self
    }

    pub fn sending_disabled() -> bool {
        std::env::var("EMAIL_SEND_DISABLED")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub async fn send_password_reset_email(
        &self,
        recipient_email: &str,
        recipient_name: &str,
        temporary_password: &str,
    ) -> Result<()> {
        let settings = load_smtp_settings()?;

        let from_address: Mailbox = format!("{} <{}>", settings.from_name, settings.from_email)
            .parse()
            .context("Invalid from email address")?;
        let to_address: Mailbox = format!("{} <{}>", recipient_name, recipient_email)
            .parse()
            .context("Invalid recipient email address")?;

        let subject = "Restablecimiento de contraseña - Agenda Escolar";
        let body = format!(
            "Hola, {}:\n\nTu contraseña fue restablecida.\nContraseña temporal: {}\n\nInicia sesión y cámbiala lo antes posible.\n",
            recipient_name, temporary_password
        );

        let email = Message::builder()
            .from(from_address)
            .to(to_address)
            .subject(subject)
            .body(body)
            .context("Failed to build email message")?;

        let mailer = build_mailer(&settings)?;
        mailer
            .send(email)
            .await
            .context("Failed to send password reset email")?;

        Ok(())
    }
}

impl Default for EmailService {
    fn default() -> Self {
        Self::new()
    }
}

fn load_smtp_settings() -> Result<SmtpSettings> {
    let server = std::env::var("SMTP_SERVER").map_err(|_| anyhow!("SMTP_SERVER is not set"))?;
    let port = std::env::var("SMTP_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(587);
    let login = std::env::var("SMTP_LOGIN").map_err(|_| anyhow!("SMTP_LOGIN is not set"))?;
    let password =
        std::env::var("SMTP_PASSWORD").map_err(|_| anyhow!("SMTP_PASSWORD is not set"))?;
    let from_name =
        std::env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Agenda Escolar".to_string());
    let from_email = std::env::var("SMTP_FROM_EMAIL").unwrap_or_else(|_| login.clone());
    let use_tls = std::env::var("SMTP_USE_TLS")
        .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
        .unwrap_or(true);

    Ok(SmtpSettings {
        server,
        port,
        login,
        password,
        from_name,
        from_email,
        use_tls,
    })
}

fn build_mailer(settings: &SmtpSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
    let creds = Credentials::new(settings.login.clone(), settings.password.clone());

    let builder = if settings.use_tls {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.server)
            .context("Invalid SMTP server for TLS")?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server)
    }
    .port(settings.port)
    .credentials(creds);

    Ok(builder.build())
}
