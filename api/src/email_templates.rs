//! HTML bodies for transactional email

/// Wrap content in the shared card layout
pub fn layout(content: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: auto; border: 1px solid #ddd; padding: 20px; border-radius: 8px; box-shadow: 0 4px 8px rgba(0, 0, 0, 0.1);">
  <main style="font-size: 16px; line-height: 1.5; margin-bottom: 20px;">
    {content}
  </main>
</div>"#
    )
}

/// `first_name` is expected to be HTML-escaped already
pub fn welcome_html(first_name: &str) -> String {
    layout(&format!(
        r#"<div style="text-align: center;">
      <h1 style="color: #333; margin-bottom: 20px;">Welcome to Our Platform!</h1>
      <p style="font-size: 18px; color: #666; margin-bottom: 30px;">Hi {first_name}, we're excited to have you on board!</p>
      <p style="color: #666; margin-bottom: 20px;">We're here to help you get the most out of your experience. If you have any questions, feel free to reach out to our support team.</p>
      <div style="margin-top: 30px; padding: 20px; background-color: #f8f9fa; border-radius: 5px;">
        <p style="color: #666; margin: 0;">Best regards,<br>The Team</p>
      </div>
    </div>"#
    ))
}

pub fn welcome_text(first_name: &str) -> String {
    format!(
        "Hi {first_name}, we're excited to have you on board!\n\n\
         If you have any questions, feel free to reach out to our support team.\n\n\
         Best regards,\nThe Team"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_is_wrapped_in_layout() {
        let html = welcome_html("Ada");
        assert!(html.starts_with("<div style=\"font-family: Arial"));
        assert!(html.contains("Hi Ada, we're excited"));
        assert!(html.contains("<main"));
    }

    #[test]
    fn text_part_has_no_markup() {
        let text = welcome_text("Ada");
        assert!(text.starts_with("Hi Ada"));
        assert!(!text.contains('<'));
    }
}
