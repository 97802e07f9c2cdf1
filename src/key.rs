// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Canonical key rendering
//!
//! Every value handed to a filter is reduced to a canonical byte string
//! before hashing or set membership. Byte-typed values contribute their bytes
//! verbatim; textual values contribute their UTF-8 bytes; integers render
//! through their decimal form. Two values with identical canonical bytes are
//! indistinguishable to the filter.

use std::borrow::Cow;

/// A value that can serve as a filter key.
///
/// # Examples
///
/// ```
/// # use xorset::key::FilterKey;
/// assert_eq!("abc".canonical_bytes().as_ref(), b"abc");
/// assert_eq!(42_u64.canonical_bytes().as_ref(), b"42");
/// assert_eq!([1_u8, 2, 3].canonical_bytes().as_ref(), &[1, 2, 3]);
/// ```
pub trait FilterKey {
    /// Returns the canonical byte rendering of this value.
    fn canonical_bytes(&self) -> Cow<'_, [u8]>;
}

impl<K: FilterKey + ?Sized> FilterKey for &K {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        (**self).canonical_bytes()
    }
}

impl FilterKey for [u8] {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }
}

impl<const N: usize> FilterKey for [u8; N] {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }
}

impl FilterKey for Vec<u8> {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }
}

impl FilterKey for str {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

impl FilterKey for String {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

macro_rules! impl_decimal_key {
    ($($ty:ty)*) => {
        $(
            impl FilterKey for $ty {
                fn canonical_bytes(&self) -> Cow<'_, [u8]> {
                    Cow::Owned(self.to_string().into_bytes())
                }
            }
        )*
    };
}

impl_decimal_key!(u8 u16 u32 u64 u128 usize i8 i16 i32 i64 i128 isize);
