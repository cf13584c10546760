use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::store::AVATAR_COLORS;

const MIN_USERNAME_LENGTH: usize = 3;
const MIN_PASSWORD_LENGTH: usize = 8;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[a-z0-9!#$%&'*+/=?^_`{|}~.-]+@([a-z0-9-]+\.)+[a-z]{2,}$")
            .expect("email regex compiles");
    /// Street, Apt, City. Street and City are letters and spaces, Apt a number
    static ref ADDRESS_REGEX: Regex =
        Regex::new(r"^[a-zA-Z\s]+, \d+, [a-zA-Z\s]+$").expect("address regex compiles");
    static ref PHONE_REGEX: Regex =
        Regex::new(r"^0\d{1,2}-?\d{7}$").expect("phone regex compiles");
    /// dd.mm.yyyy, dd/mm/yyyy or dd-mm-yyyy; the date itself is checked separately
    static ref BIRTHDAY_REGEXES: [Regex; 3] = [
        Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$").expect("birthday regex compiles"),
        Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").expect("birthday regex compiles"),
        Regex::new(r"^(\d{1,2})-(\d{1,2})-(\d{4})$").expect("birthday regex compiles"),
    ];
}

pub fn username(username: &str) -> Result<(), String> {
    if username.len() >= MIN_USERNAME_LENGTH {
        Ok(())
    } else {
        Err(format!(
            "Username must be at least {} characters long",
            MIN_USERNAME_LENGTH
        ))
    }
}

pub fn password(password: &str) -> Result<(), String> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }

    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| "*&^%$#@!".contains(c));

    if has_uppercase && has_lowercase && has_digit && has_special {
        Ok(())
    } else {
        Err(
            "Password must contain at least one uppercase, one lowercase, one number \
             and one special character"
                .to_string(),
        )
    }
}

pub fn email(email: &str) -> Result<(), String> {
    if EMAIL_REGEX.is_match(&email.to_lowercase()) {
        Ok(())
    } else {
        Err("Invalid email format. Should be a valid email address".to_string())
    }
}

pub fn address(address: &str) -> Result<(), String> {
    if ADDRESS_REGEX.is_match(address) {
        Ok(())
    } else {
        Err("Invalid address format. Should be Street, Apt, City".to_string())
    }
}

pub fn phone_number(phone_number: &str) -> Result<(), String> {
    if PHONE_REGEX.is_match(phone_number) {
        Ok(())
    } else {
        Err("Invalid phone number format".to_string())
    }
}

pub fn birthday(birthday: &str) -> Result<(), String> {
    let captures = BIRTHDAY_REGEXES
        .iter()
        .find_map(|regex| regex.captures(birthday))
        .ok_or_else(|| "Invalid birthday format. Should be dd.mm.yyyy".to_string())?;

    let day: u32 = captures[1].parse().unwrap_or(0);
    let month: u32 = captures[2].parse().unwrap_or(0);
    let year: i32 = captures[3].parse().unwrap_or(0);

    NaiveDate::from_ymd_opt(year, month, day)
        .map(|_| ())
        .ok_or_else(|| "Invalid birthday. That date does not exist".to_string())
}

pub fn avatar_color(color: &str) -> Result<(), String> {
    if AVATAR_COLORS.contains(&color) {
        Ok(())
    } else {
        Err("Invalid avatar color".to_string())
    }
}
