// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Supported locales and their metadata.

use serde::{Deserialize, Serialize};

use crate::error::LocaleError;

/// Default locale used as fallback.
pub const DEFAULT_LOCALE: Locale = Locale::En;

/// A locale the engine is willing to persist.
///
/// Free-form language tags are rejected at the boundary; anything the
/// engine stores must be one of these codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
	En,
	Zh,
	Es,
	Fr,
	De,
	Ja,
	Ko,
	Pt,
	Ru,
	Ar,
}

impl Locale {
	/// All supported locales, in display order.
	pub const ALL: &'static [Locale] = &[
		Locale::En,
		Locale::Zh,
		Locale::Es,
		Locale::Fr,
		Locale::De,
		Locale::Ja,
		Locale::Ko,
		Locale::Pt,
		Locale::Ru,
		Locale::Ar,
	];

	/// ISO 639-1 code for this locale.
	#[must_use]
	pub fn code(&self) -> &'static str {
		match self {
			Locale::En => "en",
			Locale::Zh => "zh",
			Locale::Es => "es",
			Locale::Fr => "fr",
			Locale::De => "de",
			Locale::Ja => "ja",
			Locale::Ko => "ko",
			Locale::Pt => "pt",
			Locale::Ru => "ru",
			Locale::Ar => "ar",
		}
	}

	/// Metadata for this locale.
	#[must_use]
	pub fn info(&self) -> &'static LocaleInfo {
		&LOCALE_INFOS[*self as usize]
	}

	/// Loose match against an Accept-Language style tag.
	///
	/// `"zh-CN"`, `"zh_TW"` and `"zh"` all match [`Locale::Zh`].
	#[must_use]
	pub fn matches_tag(&self, tag: &str) -> bool {
		let primary = tag
			.split(|c| c == '-' || c == '_')
			.next()
			.unwrap_or_default();
		primary.eq_ignore_ascii_case(self.code())
	}

	/// Resolve an Accept-Language style tag to a supported locale, if any.
	#[must_use]
	pub fn from_tag(tag: &str) -> Option<Locale> {
		Locale::ALL.iter().copied().find(|l| l.matches_tag(tag))
	}
}

impl std::fmt::Display for Locale {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.code())
	}
}

impl std::str::FromStr for Locale {
	type Err = LocaleError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Locale::ALL
			.iter()
			.copied()
			.find(|l| l.code() == s)
			.ok_or_else(|| LocaleError::UnknownLocale(s.to_string()))
	}
}

/// Text direction for a locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
	/// Left-to-right (e.g., English, Spanish)
	Ltr,
	/// Right-to-left (e.g., Arabic)
	Rtl,
}

impl Direction {
	/// Returns the HTML `dir` attribute value.
	#[must_use]
	pub fn as_html_dir(&self) -> &'static str {
		match self {
			Direction::Ltr => "ltr",
			Direction::Rtl => "rtl",
		}
	}
}

/// Metadata about a supported locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleInfo {
	/// ISO 639-1 language code (e.g., "en", "zh")
	pub code: &'static str,
	/// English name of the language
	pub name: &'static str,
	/// Native name of the language
	pub native_name: &'static str,
	/// Text direction
	pub direction: Direction,
}

/// Metadata table, indexed by `Locale as usize`.
const LOCALE_INFOS: &[LocaleInfo] = &[
	LocaleInfo {
		code: "en",
		name: "English",
		native_name: "English",
		direction: Direction::Ltr,
	},
	LocaleInfo {
		code: "zh",
		name: "Chinese",
		native_name: "中文",
		direction: Direction::Ltr,
	},
	LocaleInfo {
		code: "es",
		name: "Spanish",
		native_name: "Español",
		direction: Direction::Ltr,
	},
	LocaleInfo {
		code: "fr",
		name: "French",
		native_name: "Français",
		direction: Direction::Ltr,
	},
	LocaleInfo {
		code: "de",
		name: "German",
		native_name: "Deutsch",
		direction: Direction::Ltr,
	},
	LocaleInfo {
		code: "ja",
		name: "Japanese",
		native_name: "日本語",
		direction: Direction::Ltr,
	},
	LocaleInfo {
		code: "ko",
		name: "Korean",
		native_name: "한국어",
		direction: Direction::Ltr,
	},
	LocaleInfo {
		code: "pt",
		name: "Portuguese",
		native_name: "Português",
		direction: Direction::Ltr,
	},
	LocaleInfo {
		code: "ru",
		name: "Russian",
		native_name: "Русский",
		direction: Direction::Ltr,
	},
	LocaleInfo {
		code: "ar",
		name: "Arabic",
		native_name: "العربية",
		direction: Direction::Rtl,
	},
];
