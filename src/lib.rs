#![cfg_attr(not(feature = "std"), no_std)]
#![doc = include_str!("../README.md")]

pub mod averager;
pub mod config;
pub mod dac;
pub mod dispatcher;
pub mod error;
pub mod hal;
pub mod quantizer;
pub mod scale;
pub mod tables;
pub mod utils;

#[cfg(feature = "spectral")]
pub mod spectral;
#[cfg(feature = "spectral")]
pub mod spectral_loop;
