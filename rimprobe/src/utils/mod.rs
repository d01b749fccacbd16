// SPDX-License-Identifier: MIT

pub mod log;
