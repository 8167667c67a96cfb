//! LoRaWAN Node Main Application
//!
//! Entry point for the STM32L072 end-node firmware (B-L072Z-LRWAN1).
//! Brings up the trace UART, then spawns the heartbeat and UART tasks.

#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::mode::Async;
use embassy_stm32::usart::{self, UartTx};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Instant, Timer};
use embedded_io_async::Write;
use heapless::Vec;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use lrwan_node::prelude::*;
use lrwan_node::trace::file_name;

type Frame = Vec<u8, TRACE_FRAME_MAX>;
type Trace = TraceChannel<'static, UartOutput, BoardHooks>;

/// Next frame for the UART task
static FRAME: Signal<CriticalSectionRawMutex, Frame> = Signal::new();

static LPM: LowPowerManager<BoardHooks> = LowPowerManager::with_hooks(BoardHooks);
static TRACE_STORAGE: StaticCell<[u8; TRACE_QUEUE_SIZE]> = StaticCell::new();
static TRACE: StaticCell<Trace> = StaticCell::new();

/// Sleep hooks for the STM32L0 core
struct BoardHooks;

impl LowPowerHooks for BoardHooks {
    fn enter_sleep(&self) {
        cortex_m::asm::wfi();
    }

    fn enter_stop(&self) {
        cortex_m::asm::wfi();
    }

    fn exit_stop(&self) {
        trace!("woke from stop");
    }

    fn enter_off(&self) {
        cortex_m::asm::wfi();
    }

    fn exit_off(&self) {
        trace!("woke from off");
    }
}

/// Hands frames to the UART task.
///
/// The async UART driver needs an owned buffer, so the frame is copied
/// once here; the task reports completion back to the channel.
struct UartOutput;

impl TraceOutput for UartOutput {
    fn start_transmit(&mut self, frame: &[u8]) {
        let mut copy = Frame::new();
        let len = frame.len().min(TRACE_FRAME_MAX);
        let _ = copy.extend_from_slice(&frame[..len]);
        FRAME.signal(copy);
    }
}

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("LoRaWAN node firmware v{}", env!("CARGO_PKG_VERSION"));

    let config = embassy_stm32::Config::default();
    let p = embassy_stm32::init(config);

    info!("Peripherals initialized");

    // Green user LED on PB5
    let led = Output::new(p.PB5, Level::Low, Speed::Low);

    // USART2 on PA2 is wired to the ST-LINK virtual COM port
    let mut uart_config = usart::Config::default();
    uart_config.baudrate = TRACE_BAUD_RATE;
    let tx = match UartTx::new(p.USART2, p.PA2, p.DMA1_CH4, uart_config) {
        Ok(tx) => tx,
        Err(_) => {
            warn!("trace UART config rejected, tracing disabled");
            loop {
                Timer::after_secs(60).await;
            }
        }
    };

    info!("Trace UART at {} baud", TRACE_BAUD_RATE);

    let storage = TRACE_STORAGE.init([0; TRACE_QUEUE_SIZE]);
    let trace: &'static Trace = TRACE.init(TraceChannel::new(storage, UartOutput, &LPM));

    spawner.must_spawn(trace_uart_task(tx, trace));
    spawner.must_spawn(heartbeat_task(led, trace));

    let _ = trace_send!(trace, "{}: boot\r\n", file_name(file!()));

    loop {
        Timer::after_secs(10).await;
        let mode = LPM.enter_low_power();
        info!("idle in {}", mode);
    }
}

/// Forwards queued frames to USART2 and acknowledges each one
#[embassy_executor::task]
async fn trace_uart_task(mut tx: UartTx<'static, Async>, trace: &'static Trace) {
    loop {
        let frame = FRAME.wait().await;
        if tx.write_all(&frame).await.is_err() {
            warn!("trace UART write failed, {} bytes lost", frame.len());
        }
        trace.on_transmit_complete();
    }
}

/// Heartbeat task - blinks the LED and traces an uptime stamp
#[embassy_executor::task]
async fn heartbeat_task(mut led: Output<'static>, trace: &'static Trace) {
    let mut beats: u32 = 0;
    loop {
        led.set_high();
        Timer::after_millis(50).await;
        led.set_low();

        let now = Instant::now().as_millis();
        if trace_verbose!(
            trace,
            Verbosity::Level1,
            "{:3}s{:03}: heartbeat {}\r\n",
            now / 1000,
            now % 1000,
            beats
        )
        .is_err()
        {
            warn!("heartbeat trace dropped");
        }
        beats = beats.wrapping_add(1);

        Timer::after_millis(HEARTBEAT_PERIOD_MS - 50).await;
    }
}
