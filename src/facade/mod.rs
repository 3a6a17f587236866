// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! User-facing components. Each facade object sends command signals into
//! the worker owning the backend component and blocks on the matching
//! notification.

pub mod endpoint;
pub mod session;
pub mod socket;
