//! Form validation run before any remote call.

use crate::constants::{CATEGORIES, CATEGORY_ALL};
use crate::error::ValidationError;

/// Loose `something@something.something` check, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() {
        return false;
    }
    // Needs a dot with at least one char on either side.
    match domain.rfind('.') {
        Some(dot) => dot > 0 && dot + 1 < domain.len(),
        None => false,
    }
}

/// Whether `email` belongs to `domain` (e.g. `silicon.ac.in`), with a
/// plain local part.
pub fn has_email_domain(email: &str, domain: &str) -> bool {
    let Some((local, host)) = email.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c))
        && host.eq_ignore_ascii_case(domain)
}

fn require(errors: &mut ValidationError, field: &str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.add(field, message);
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        validate_email(&mut errors, self.email.trim(), None);
        require(&mut errors, "password", &self.password, "Password is required");
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl SignupForm {
    /// `required_domain` restricts sign-ups to one institutional domain.
    pub fn validate(&self, required_domain: Option<&str>) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        require(&mut errors, "first_name", &self.first_name, "First name is required");
        require(&mut errors, "last_name", &self.last_name, "Last name is required");
        validate_email(&mut errors, self.email.trim(), required_domain);
        require(&mut errors, "password", &self.password, "Password is required");
        errors.into_result()
    }
}

fn validate_email(errors: &mut ValidationError, email: &str, required_domain: Option<&str>) {
    if email.is_empty() {
        errors.add("email", "Email is required");
    } else if !is_valid_email(email) {
        errors.add("email", "Please enter a valid email");
    } else if let Some(domain) = required_domain {
        if !has_email_domain(email, domain) {
            errors.add("email", &format!("Email must be a @{domain} address"));
        }
    }
}

/// Raw add-listing form input, as typed.
#[derive(Debug, Clone, Default)]
pub struct ListingForm {
    pub title: String,
    pub category: String,
    pub price: String,
    pub description: String,
    pub image_url: String,
}

impl ListingForm {
    /// Validates every field and returns the parsed price.
    pub fn validate(&self) -> Result<f64, ValidationError> {
        let mut errors = ValidationError::new();
        require(&mut errors, "title", &self.title, "Title is required");
        let category = self.category.trim();
        if category.is_empty() {
            errors.add("category", "Category is required");
        } else if category == CATEGORY_ALL || !CATEGORIES.contains(&category) {
            errors.add("category", "Please choose a category");
        }
        require(&mut errors, "description", &self.description, "Description is required");
        require(&mut errors, "image_url", &self.image_url, "Image is required");

        let price = if self.price.trim().is_empty() {
            errors.add("price", "Price is required");
            None
        } else {
            match self.price.trim().parse::<f64>() {
                Ok(p) if p.is_finite() && p > 0.0 => Some(p),
                _ => {
                    errors.add("price", "Price must be a positive number");
                    None
                }
            }
        };

        errors.into_result()?;
        Ok(price.unwrap_or_default())
    }
}

/// Shipping details collected at checkout. Every field is required.
#[derive(Debug, Clone, Default)]
pub struct CheckoutForm {
    pub name: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub phone: String,
}

impl CheckoutForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        for (field, value) in [
            ("name", &self.name),
            ("email", &self.email),
            ("address", &self.address),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("phone", &self.phone),
        ] {
            require(&mut errors, field, value, "Please fill in all fields");
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last@silicon.ac.in"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a b@c.d"));
        assert!(!is_valid_email("plain"));
    }

    #[test]
    fn institutional_domain() {
        assert!(has_email_domain("ravi_22@silicon.ac.in", "silicon.ac.in"));
        assert!(!has_email_domain("ravi@gmail.com", "silicon.ac.in"));
        assert!(!has_email_domain("ra vi@silicon.ac.in", "silicon.ac.in"));
    }

    #[test]
    fn signup_collects_every_problem() {
        let form = SignupForm {
            email: "nope".into(),
            ..Default::default()
        };
        let err = form.validate(None).unwrap_err();
        assert_eq!(err.get("first_name"), Some("First name is required"));
        assert_eq!(err.get("last_name"), Some("Last name is required"));
        assert_eq!(err.get("email"), Some("Please enter a valid email"));
        assert_eq!(err.get("password"), Some("Password is required"));
    }

    #[test]
    fn signup_domain_restriction() {
        let form = SignupForm {
            first_name: "Ravi".into(),
            last_name: "Das".into(),
            email: "ravi@gmail.com".into(),
            password: "secret".into(),
        };
        assert!(form.validate(None).is_ok());
        let err = form.validate(Some("silicon.ac.in")).unwrap_err();
        assert_eq!(err.get("email"), Some("Email must be a @silicon.ac.in address"));
    }

    #[test]
    fn listing_price_must_parse() {
        let mut form = ListingForm {
            title: "Bike".into(),
            category: "Sports".into(),
            price: "abc".into(),
            description: "Barely used".into(),
            image_url: "https://img/bike.jpg".into(),
        };
        assert!(form.validate().unwrap_err().get("price").is_some());
        form.price = " 2500.5 ".into();
        assert_eq!(form.validate().unwrap(), 2500.5);
    }

    #[test]
    fn listing_category_must_be_offered() {
        let mut form = ListingForm {
            title: "Lamp".into(),
            category: "Gadgets".into(),
            price: "300".into(),
            description: "Desk lamp".into(),
            image_url: "https://img/lamp.jpg".into(),
        };
        let err = form.validate().unwrap_err();
        assert_eq!(err.get("category"), Some("Please choose a category"));

        form.category = CATEGORY_ALL.into();
        assert!(form.validate().unwrap_err().get("category").is_some());

        form.category = "".into();
        assert_eq!(
            form.validate().unwrap_err().get("category"),
            Some("Category is required")
        );

        form.category = "Furniture".into();
        assert_eq!(form.validate().unwrap(), 300.0);
    }

    #[test]
    fn email_is_trimmed_before_checking() {
        let login = LoginForm {
            email: " ada@silicon.ac.in ".into(),
            password: "secret".into(),
        };
        assert!(login.validate().is_ok());

        let signup = SignupForm {
            first_name: "Ada".into(),
            last_name: "L".into(),
            email: "  ada@silicon.ac.in".into(),
            password: "secret".into(),
        };
        assert!(signup.validate(Some("silicon.ac.in")).is_ok());

        let blank = LoginForm {
            email: "   ".into(),
            password: "secret".into(),
        };
        assert_eq!(blank.validate().unwrap_err().get("email"), Some("Email is required"));
    }

    #[test]
    fn checkout_requires_all_fields() {
        let form = CheckoutForm {
            name: "A".into(),
            email: "a@b.c".into(),
            address: "  ".into(),
            city: "X".into(),
            postal_code: "751024".into(),
            phone: "99".into(),
        };
        let err = form.validate().unwrap_err();
        assert_eq!(err.fields().count(), 1);
        assert!(err.get("address").is_some());
    }
}
