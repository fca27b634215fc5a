//! Media types and content negotiation.
//!
//! A [`MediaTypeList`] is parsed from one or more raw `Accept`-style header
//! values. A server's available list is then narrowed against a client's
//! requested list with [`MediaTypeList::filter`] (the full ranked list) or
//! [`MediaTypeList::choose`] (only the winner).
//!
//! Quality composes by multiplication: an offer of `application/yaml;q=0.8`
//! matched by a request of `*/*;q=0.25` ranks at `0.2`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use thiserror::Error;

/// The wildcard type or subtype.
pub const WILDCARD: &str = "*";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaTypeError {
    #[error("no media type in {0:?}")]
    Empty(String),
}

/// One parsed media-type preference.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaType {
    pub ty: String,
    pub subtype: String,
    /// Preference weight in `[0, 1]`.
    pub quality: f64,
    pub params: BTreeMap<String, String>,
    /// Position in the list this entry was parsed or filtered into.
    pub index: usize,
}

impl MediaType {
    pub fn new(ty: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            subtype: subtype.into(),
            quality: 1.0,
            params: BTreeMap::new(),
            index: 0,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set the quality, clamped into `[0, 1]`.
    pub fn with_quality(mut self, quality: f64) -> Self {
        self.quality = clamp_quality(quality);
        self
    }

    /// Whether `known` satisfies this (requested) media type.
    ///
    /// Wildcards match anything; every parameter on `self` must be present on
    /// `known` with the same value. Extra parameters on `known` are ignored.
    pub fn matches(&self, known: &MediaType) -> bool {
        if self.ty != WILDCARD && self.ty != known.ty {
            return false;
        }
        if self.subtype != WILDCARD && self.subtype != known.subtype {
            return false;
        }
        self.params
            .iter()
            .all(|(k, v)| known.params.get(k).is_some_and(|kv| kv == v))
    }

    /// Preference ordering: `Less` means `self` ranks ahead of `other`.
    pub fn compare(&self, other: &MediaType) -> Ordering {
        match other.quality.partial_cmp(&self.quality) {
            Some(Ordering::Less) => return Ordering::Less,
            Some(Ordering::Greater) => return Ordering::Greater,
            _ => {}
        }

        let (a, b) = (self, other);
        if a.ty == b.ty {
            if a.subtype == b.subtype {
                // More parameters is more specific.
                return b.params.len().cmp(&a.params.len());
            }
            if a.subtype == WILDCARD {
                return Ordering::Greater;
            }
            if b.subtype == WILDCARD {
                return Ordering::Less;
            }
            return self.index.cmp(&other.index);
        }
        if a.ty == WILDCARD {
            return Ordering::Greater;
        }
        if b.ty == WILDCARD {
            return Ordering::Less;
        }
        self.index.cmp(&other.index)
    }

    /// `type/subtype` plus parameters, without the quality.
    pub fn essence(&self) -> String {
        let mut out = format!("{}/{}", self.ty, self.subtype);
        for (k, v) in &self.params {
            out.push(';');
            out.push_str(k);
            out.push('=');
            out.push_str(v);
        }
        out
    }

    /// Parse one comma-separated token. Blank tokens yield `None`.
    fn parse_token(token: &str, index: usize) -> Option<MediaType> {
        let mut pieces = token.split(';').map(str::trim);
        let range = pieces.next().filter(|r| !r.is_empty())?;
        let (ty, subtype) = range.split_once('/').unwrap_or((range, WILDCARD));

        let mut media = MediaType::new(ty, subtype);
        media.index = index;
        for piece in pieces.filter(|p| !p.is_empty()) {
            if let Some(q) = piece.strip_prefix("q=") {
                media.quality = parse_quality(q);
                continue;
            }
            let (key, value) = piece.split_once('=').unwrap_or((piece, "true"));
            media.params.insert(key.trim().to_string(), value.trim().to_string());
        }
        Some(media)
    }
}

fn clamp_quality(q: f64) -> f64 {
    if q.is_finite() {
        q.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

// Unparseable qualities fall back to the default rather than excluding the entry.
fn parse_quality(raw: &str) -> f64 {
    raw.trim().parse::<f64>().map(clamp_quality).unwrap_or(1.0)
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.essence())?;
        if self.quality != 1.0 {
            write!(f, ";q={}", self.quality)?;
        }
        Ok(())
    }
}

impl FromStr for MediaType {
    type Err = MediaTypeError;

    /// Parse the first media type of a header value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .find_map(|token| MediaType::parse_token(token, 0))
            .ok_or_else(|| MediaTypeError::Empty(s.to_string()))
    }
}

/// An ordered list of media types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaTypeList(Vec<MediaType>);

impl MediaTypeList {
    /// Parse raw header values.
    ///
    /// Each value is split on commas, each token on semicolons. A bare token
    /// such as `en-US` becomes `en-US/*`; a parameter without `=` is a flag
    /// (`flag=true`). Indices are assigned across all values in parse order.
    pub fn parse<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut types = Vec::new();
        for value in raw {
            for token in value.as_ref().split(',') {
                if let Some(media) = MediaType::parse_token(token, types.len()) {
                    types.push(media);
                }
            }
        }
        MediaTypeList(types)
    }

    /// `*/*`, what an absent `Accept` header means.
    pub fn any() -> Self {
        MediaTypeList(vec![MediaType::new(WILDCARD, WILDCARD)])
    }

    /// A copy sorted highest preference first. Ties keep their input order.
    pub fn sorted(&self) -> MediaTypeList {
        let mut out = self.0.clone();
        sort_stable(&mut out);
        MediaTypeList(out)
    }

    /// Every `(known, requested)` match, ranked.
    ///
    /// Each entry is a copy of the available type with quality multiplied by
    /// the matching request's quality. A known type matched by several
    /// requests appears once per match.
    ///
    /// The output grows with `available × requested`; prefer [`choose`] when
    /// only the winner is needed.
    ///
    /// [`choose`]: MediaTypeList::choose
    pub fn filter(&self, requested: &MediaTypeList) -> MediaTypeList {
        let mut out: Vec<MediaType> = Vec::new();
        for known in &self.0 {
            for req in &requested.0 {
                if req.matches(known) {
                    let mut media = known.clone();
                    media.index = out.len();
                    media.quality = known.quality * req.quality;
                    out.push(media);
                }
            }
        }
        sort_stable(&mut out);
        MediaTypeList(out)
    }

    /// The first entry [`filter`](MediaTypeList::filter) would return.
    /// `None` when nothing matches.
    ///
    /// Compare is not transitive across unrelated types, so the winner is read
    /// off the sorted list rather than found by a running maximum.
    pub fn choose(&self, requested: &MediaTypeList) -> Option<MediaType> {
        self.filter(requested).0.into_iter().next()
    }

    pub fn into_vec(self) -> Vec<MediaType> {
        self.0
    }
}

// Compare is antisymmetric but not transitive across differing types, which
// `slice::sort_by` does not permit. Insertion sort only relies on pairwise
// comparisons of neighbours, so no adjacent pair ends up `Greater`.
fn sort_stable(list: &mut [MediaType]) {
    for i in 1..list.len() {
        let mut j = i;
        while j > 0 && list[j - 1].compare(&list[j]) == Ordering::Greater {
            list.swap(j - 1, j);
            j -= 1;
        }
    }
}

impl Deref for MediaTypeList {
    type Target = [MediaType];

    fn deref(&self) -> &[MediaType] {
        &self.0
    }
}

impl FromIterator<MediaType> for MediaTypeList {
    /// Collect, renumbering indices by position.
    fn from_iter<I: IntoIterator<Item = MediaType>>(iter: I) -> Self {
        MediaTypeList(
            iter.into_iter()
                .enumerate()
                .map(|(index, mut media)| {
                    media.index = index;
                    media
                })
                .collect(),
        )
    }
}

impl IntoIterator for MediaTypeList {
    type Item = MediaType;
    type IntoIter = std::vec::IntoIter<MediaType>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a MediaTypeList {
    type Item = &'a MediaType;
    type IntoIter = std::slice::Iter<'a, MediaType>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromStr for MediaTypeList {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(MediaTypeList::parse([s]))
    }
}

impl fmt::Display for MediaTypeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, media) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{media}")?;
        }
        Ok(())
    }
}

// --- tests -------------------------------------------------------------------
