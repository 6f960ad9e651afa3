use crate::config::EmailConfig;
use crate::error::app_error::AppError;
use crate::models::job_link::JobLink;
use lettre::message::header::ContentType;
use lettre::message::{MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Escapes text for interpolation into HTML element content and quoted attributes.
fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Outbound delivery of issued links over SMTP.
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub async fn send_magic_link_email(&self, to_email: &str, link: &str, expires_in: &str) -> Result<(), AppError> {
        if !self.config.enabled {
            tracing::warn!("Email service is disabled, skipping magic link email");
            return Ok(());
        }

        let subject = "Your sign-in link";
        let html_body = self.magic_link_html(link, expires_in);
        let text_body = self.magic_link_text(link, expires_in);

        self.send_email(to_email, subject, &html_body, &text_body).await
    }

    pub async fn send_job_link_email(&self, job: &JobLink, link: &str, expires_in: &str) -> Result<(), AppError> {
        if !self.config.enabled {
            tracing::warn!(job_id = %job.job_id, "Email service is disabled, skipping job link email");
            return Ok(());
        }

        let subject = format!("New job {}", job.job_id);
        let html_body = self.job_link_html(job, link, expires_in);
        let text_body = self.job_link_text(job, link, expires_in);

        self.send_email(&job.driver_email, &subject, &html_body, &text_body).await
    }

    fn magic_link_html(&self, link: &str, expires_in: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Your sign-in link</title></head>
<body style="font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; color: #141517;">
    <h1 style="font-size: 22px;">Sign in to {from}</h1>
    <p>Use the button below to sign in. The link works once and expires in {expires_in}.</p>
    <p><a href="{link}" style="display: inline-block; padding: 12px 20px; background: #1f6feb; color: #ffffff; border-radius: 8px; text-decoration: none;">Sign in</a></p>
    <p style="font-size: 13px; color: #5c5f66;">If you did not ask for this link you can ignore this message.</p>
</body>
</html>"#,
            from = escape_html(&self.config.from_name),
            link = escape_html(link),
            expires_in = escape_html(expires_in)
        )
    }

    fn magic_link_text(&self, link: &str, expires_in: &str) -> String {
        format!(
            "Sign in to {}\n\nOpen this link to sign in (single use, expires in {}):\n{}\n\nIf you did not ask for this link you can ignore this message.\n",
            self.config.from_name, expires_in, link
        )
    }

    fn job_link_html(&self, job: &JobLink, link: &str, expires_in: &str) -> String {
        // Every trip field comes from an unauthenticated request.
        let greeting = escape_html(job.driver_name.as_deref().unwrap_or("driver"));
        let fare = job.fare.map(|f| format!("{:.2}", f)).unwrap_or_else(|| "-".to_string());
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>New job {job_id}</title></head>
<body style="font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; color: #141517;">
    <h1 style="font-size: 22px;">Hi {greeting}, you have a new job</h1>
    <table style="border-collapse: collapse;">
        <tr><td style="padding: 4px 12px 4px 0;"><strong>Job</strong></td><td>{job_id}</td></tr>
        <tr><td style="padding: 4px 12px 4px 0;"><strong>Pickup</strong></td><td>{pickup}</td></tr>
        <tr><td style="padding: 4px 12px 4px 0;"><strong>Dropoff</strong></td><td>{dropoff}</td></tr>
        <tr><td style="padding: 4px 12px 4px 0;"><strong>Time</strong></td><td>{time}</td></tr>
        <tr><td style="padding: 4px 12px 4px 0;"><strong>Fare</strong></td><td>{fare}</td></tr>
    </table>
    <p><a href="{link}" style="display: inline-block; padding: 12px 20px; background: #1f6feb; color: #ffffff; border-radius: 8px; text-decoration: none;">Open job</a></p>
    <p style="font-size: 13px; color: #5c5f66;">This link expires in {expires_in}.</p>
</body>
</html>"#,
            job_id = escape_html(&job.job_id),
            greeting = greeting,
            pickup = escape_html(&job.pickup.address),
            dropoff = escape_html(&job.dropoff.address),
            time = job.job_time.to_rfc3339(),
            fare = fare,
            link = escape_html(link),
            expires_in = escape_html(expires_in)
        )
    }

    fn job_link_text(&self, job: &JobLink, link: &str, expires_in: &str) -> String {
        format!(
            "New job {}\n\nPickup: {}\nDropoff: {}\nTime: {}\n\nOpen the job (expires in {}):\n{}\n",
            job.job_id,
            job.pickup.address,
            job.dropoff.address,
            job.job_time.to_rfc3339(),
            expires_in,
            link
        )
    }

    async fn send_email(&self, to_email: &str, subject: &str, html_body: &str, text_body: &str) -> Result<(), AppError> {
        let email = Message::builder()
            .from(
                format!("{} <{}>", self.config.from_name, self.config.from_address)
                    .parse()
                    .map_err(|e| AppError::email(format!("Invalid from address: {}", e)))?,
            )
            .to(to_email.parse().map_err(|e| AppError::email(format!("Invalid to address: {}", e)))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_PLAIN).body(text_body.to_string()))
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_HTML).body(html_body.to_string())),
            )
            .map_err(|e| AppError::email(format!("Failed to build email: {}", e)))?;

        let creds = Credentials::new(self.config.smtp_username.clone(), self.config.smtp_password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
            .map_err(|e| AppError::email(format!("Failed to create SMTP transport: {}", e)))?
            .credentials(creds)
            .port(self.config.smtp_port)
            .build();

        mailer
            .send(email)
            .await
            .map_err(|e| AppError::email(format!("Failed to send email: {}", e)))?;

        tracing::info!(subject = %subject, "link email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::job_request;

    fn service() -> EmailService {
        EmailService::new(EmailConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: "test".to_string(),
            smtp_password: "test".to_string(),
            from_address: "noreply@ridelink.test".to_string(),
            from_name: "Ridelink".to_string(),
            enabled: false,
        })
    }

    fn job() -> JobLink {
        let request = job_request("J7");
        let now = chrono::Utc::now();
        JobLink {
            id: uuid::Uuid::new_v4(),
            job_id: "J7".to_string(),
            driver_email: "d@x.com".to_string(),
            driver_name: Some("Dana".to_string()),
            driver_phone: None,
            pickup: crate::models::job_link::Place {
                address: request.pickup_address.unwrap_or_default(),
                lat: 1.0,
                lng: 1.0,
            },
            dropoff: crate::models::job_link::Place {
                address: request.dropoff_address.unwrap_or_default(),
                lat: 2.0,
                lng: 2.0,
            },
            job_time: now,
            fare: Some(42.5),
            payment_status: "paid".to_string(),
            status: crate::models::job_link::JobStatus::Pending,
            created_at: now,
            expires_at: now,
            accepted_at: None,
            completed_at: None,
            ip_address: None,
            user_agent: None,
        }
    }

    #[test]
    fn magic_link_bodies_carry_link_and_expiry() {
        let service = service();
        let html = service.magic_link_html("https://ride.example/auth/verify?token=abc", "3 days");
        let text = service.magic_link_text("https://ride.example/auth/verify?token=abc", "3 days");

        assert!(html.contains("https://ride.example/auth/verify?token=abc"));
        assert!(html.contains("3 days"));
        assert!(text.contains("https://ride.example/auth/verify?token=abc"));
        assert!(text.contains("Ridelink"));
    }

    #[test]
    fn job_bodies_carry_trip_details() {
        let service = service();
        let job = job();
        let html = service.job_link_html(&job, "https://ride.example/driver/job?token=abc", "24 hours");
        let text = service.job_link_text(&job, "https://ride.example/driver/job?token=abc", "24 hours");

        assert!(html.contains("Dana"));
        assert!(html.contains("42.50"));
        assert!(html.contains(&job.pickup.address));
        assert!(text.contains(&job.dropoff.address));
        assert!(text.contains("24 hours"));
    }

    #[test]
    fn job_html_escapes_request_fields() {
        let service = service();
        let mut job = job();
        job.pickup.address = "<script>alert(1)</script>".to_string();
        job.driver_name = Some("<b>Dana</b> & co".to_string());
        job.job_id = "J\"7".to_string();

        let html = service.job_link_html(&job, "https://ride.example/driver/job?token=abc", "24 hours");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("&lt;b&gt;Dana&lt;/b&gt; &amp; co"));
        assert!(html.contains("J&quot;7"));
    }

    #[test]
    fn escape_html_leaves_plain_text_alone() {
        assert_eq!(escape_html("Main St 5, Springfield"), "Main St 5, Springfield");
        assert_eq!(escape_html("a<b>&'c\""), "a&lt;b&gt;&amp;&#x27;c&quot;");
    }

    #[rocket::async_test]
    async fn disabled_service_skips_delivery() {
        let service = service();
        assert!(service.send_magic_link_email("a@b.com", "https://x/y?token=z", "1 days").await.is_ok());
        assert!(service.send_job_link_email(&job(), "https://x/y?token=z", "24 hours").await.is_ok());
    }
}
